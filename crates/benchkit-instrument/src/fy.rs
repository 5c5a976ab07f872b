//! FY3200S-class signal generator driver (FeelTech ASCII serial protocol).
//!
//! The FY32xx series speaks a terse ASCII protocol: one command per line,
//! single-letter channel prefix (`b` = main channel, `d` = secondary),
//! newline terminated, no acknowledgement. Frequency is sent in centihertz
//! as a zero-padded 9-digit field, amplitude and offset in volts with two
//! decimals, duty in tenths of a percent.

use crate::{GeneratorSetting, InstrumentError, Result, SignalGenerator, WaveShape};
use serialport::SerialPort;
use std::io::Write;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Serial protocol variant of the connected generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FyProtocol {
    /// FY3200S family, 9600 baud ASCII.
    #[default]
    Ascii9600,
    /// FY6800/FY6900 family, 115200 baud ASCII.
    Ascii115200,
}

impl FyProtocol {
    /// Serial baud rate for this protocol variant.
    pub fn baud(self) -> u32 {
        match self {
            Self::Ascii9600 => 9600,
            Self::Ascii115200 => 115200,
        }
    }
}

impl FromStr for FyProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        if label.is_empty() || label.contains("9600") {
            Ok(Self::Ascii9600)
        } else if label.contains("115200") {
            Ok(Self::Ascii115200)
        } else {
            Err(format!("unknown FY protocol '{s}'"))
        }
    }
}

fn wave_code(shape: WaveShape) -> u8 {
    match shape {
        WaveShape::Sine => 0,
        WaveShape::Square => 1,
        WaveShape::Triangle => 2,
        WaveShape::Ramp => 3,
    }
}

/// Encode one setting as the ASCII command lines to send, in order.
///
/// Split out from the port I/O so the protocol framing is testable without
/// hardware.
pub fn encode_setting(setting: &GeneratorSetting) -> Vec<String> {
    let prefix = if setting.channel == 2 { 'd' } else { 'b' };
    let centi_hz = (setting.freq_hz * 100.0).round().max(0.0) as u64;

    let mut lines = vec![
        format!("{prefix}w{}", wave_code(setting.shape)),
        format!("{prefix}f{centi_hz:09}"),
        format!("{prefix}a{:.2}", setting.amp_vpp),
        format!("{prefix}o{:.2}", setting.offset_v),
    ];
    if let Some(duty) = setting.duty {
        let tenths = (duty.clamp(0.0, 100.0) * 10.0).round() as u32;
        lines.push(format!("{prefix}d{tenths:03}"));
    }
    lines
}

/// Driver for an FY3200S-class generator on a serial port.
pub struct FyGenerator {
    port: Box<dyn SerialPort>,
    protocol: FyProtocol,
    /// Pacing between command lines; the FY32xx drops bytes without it.
    inter_command_gap: Duration,
}

impl FyGenerator {
    /// Open the generator on `path` with the given protocol variant.
    pub fn open(path: &str, protocol: FyProtocol) -> Result<Self> {
        let port = serialport::new(path, protocol.baud())
            .timeout(Duration::from_millis(500))
            .open()
            .map_err(|e| InstrumentError::Open {
                resource: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            port,
            protocol,
            inter_command_gap: Duration::from_millis(20),
        })
    }

    /// Protocol variant this driver was opened with.
    pub fn protocol(&self) -> FyProtocol {
        self.protocol
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        thread::sleep(self.inter_command_gap);
        Ok(())
    }
}

impl SignalGenerator for FyGenerator {
    fn apply(&mut self, setting: &GeneratorSetting) -> Result<()> {
        tracing::debug!(
            freq_hz = setting.freq_hz,
            amp_vpp = setting.amp_vpp,
            channel = setting.channel,
            "fy apply"
        );
        for line in encode_setting(setting) {
            self.send_line(&line)?;
        }
        Ok(())
    }
}
