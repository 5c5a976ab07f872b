//! Benchkit instrument layer - typed boundary over the bench hardware.
//!
//! This crate provides:
//!
//! - **Typed identifiers**: [`TraceSource`] (scope channel or MATH trace),
//!   [`MathOrder`], [`WaveShape`] - raw user input is parsed into these once,
//!   at the boundary, instead of passing strings around.
//! - **Traits**: [`SignalGenerator`] and [`Oscilloscope`], the functional
//!   contracts the sweep drivers consume.
//! - **[`Bench`]**: the generator+scope pair handed to a sweep as one object.
//! - **Drivers**: [`fy::FyGenerator`] (FY3200S-class serial protocol) and
//!   [`tek::TekScope`] (Tektronix SCPI over a raw TCP socket).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use benchkit_instrument::{Bench, fy::FyGenerator, tek::TekScope};
//!
//! let generator = FyGenerator::open("/dev/ttyUSB0", Default::default())?;
//! let scope = TekScope::connect("192.168.1.40:4000")?;
//! let mut bench = Bench { generator, scope };
//! ```

pub mod fy;
pub mod tek;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Error types for instrument operations.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    /// Failed to open or connect to an instrument resource.
    #[error("failed to open instrument '{resource}': {reason}")]
    Open {
        /// Resource identifier (serial port path or scope address).
        resource: String,
        /// Underlying failure description.
        reason: String,
    },

    /// Serial link error.
    #[error("serial link error: {0}")]
    Serial(#[from] serialport::Error),

    /// Socket or stream I/O error.
    #[error("instrument I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An instrument reply could not be interpreted.
    #[error("unparseable instrument reply to '{query}': {reply:?}")]
    BadReply {
        /// The query that was issued.
        query: String,
        /// The reply as received.
        reply: String,
    },
}

/// Convenience result type for instrument operations.
pub type Result<T> = std::result::Result<T, InstrumentError>;

/// Generator output waveform shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveShape {
    /// Sine, the sweep and idle default.
    #[default]
    Sine,
    /// Square.
    Square,
    /// Triangle.
    Triangle,
    /// Rising sawtooth.
    Ramp,
}

/// One complete generator output setting, applied atomically per point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorSetting {
    /// Output frequency in Hz.
    pub freq_hz: f64,
    /// Output amplitude, peak to peak volts.
    pub amp_vpp: f64,
    /// Waveform shape.
    pub shape: WaveShape,
    /// DC offset in volts.
    pub offset_v: f64,
    /// Duty cycle in percent, only meaningful for square output.
    pub duty: Option<f64>,
    /// Generator output channel (1 = main, 2 = secondary).
    pub channel: u8,
}

impl GeneratorSetting {
    /// A sine tone on channel 1 with zero offset - the shape every sweep
    /// point and the post-sweep idle restore use.
    pub fn sine(freq_hz: f64, amp_vpp: f64) -> Self {
        Self {
            freq_hz,
            amp_vpp,
            shape: WaveShape::Sine,
            offset_v: 0.0,
            duty: None,
            channel: 1,
        }
    }
}

/// A calibrated waveform capture: per-sample times and voltages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Capture {
    /// Sample instants in seconds.
    pub times: Vec<f64>,
    /// Sample voltages.
    pub volts: Vec<f64>,
}

/// A scope acquisition source: a numbered analog channel or the MATH trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceSource {
    /// Analog channel 1-4.
    Channel(u8),
    /// The scope-computed MATH trace.
    Math,
}

impl TraceSource {
    /// Build a channel source, rejecting out-of-range numbers.
    pub fn channel(n: u8) -> Option<Self> {
        (1..=4).contains(&n).then_some(Self::Channel(n))
    }
}

impl fmt::Display for TraceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(n) => write!(f, "CH{n}"),
            Self::Math => write!(f, "MATH"),
        }
    }
}

impl FromStr for TraceSource {
    type Err = String;

    /// Accepts `"1"`..`"4"`, `"CH1"`..`"CH4"` (any case), and `"MATH"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let label = s.trim().to_ascii_uppercase();
        if label == "MATH" {
            return Ok(Self::Math);
        }
        let digits = label.strip_prefix("CH").unwrap_or(&label);
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::channel)
            .ok_or_else(|| format!("unknown trace source '{s}'"))
    }
}

/// Operand order for the scope MATH subtraction trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathOrder {
    /// CH1 - CH2.
    #[default]
    Ch1MinusCh2,
    /// CH2 - CH1.
    Ch2MinusCh1,
}

impl MathOrder {
    /// The two operand channels, minuend first.
    pub fn operands(self) -> (TraceSource, TraceSource) {
        match self {
            Self::Ch1MinusCh2 => (TraceSource::Channel(1), TraceSource::Channel(2)),
            Self::Ch2MinusCh1 => (TraceSource::Channel(2), TraceSource::Channel(1)),
        }
    }
}

impl fmt::Display for MathOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.operands();
        write!(f, "{a}-{b}")
    }
}

impl FromStr for MathOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CH1-CH2" => Ok(Self::Ch1MinusCh2),
            "CH2-CH1" => Ok(Self::Ch2MinusCh1),
            other => Err(format!("unknown math order '{other}'")),
        }
    }
}

/// Functional contract of the signal generator side of the bench.
pub trait SignalGenerator {
    /// Apply one complete output setting.
    fn apply(&mut self, setting: &GeneratorSetting) -> Result<()>;
}

/// Functional contract of the oscilloscope side of the bench.
pub trait Oscilloscope {
    /// Capture a calibrated waveform from `source`.
    fn capture_calibrated(&mut self, source: TraceSource, timeout: Duration) -> Result<Capture>;

    /// Arm a single-sequence acquisition.
    fn arm_single(&mut self) -> Result<()>;

    /// Block until the armed acquisition completes, or `timeout` elapses.
    /// Returns `false` on timeout.
    fn wait_single_complete(&mut self, timeout: Duration) -> Result<bool>;

    /// Return the scope to free-running acquisition.
    fn resume_run(&mut self) -> Result<()>;

    /// Set the horizontal scale in seconds per division.
    fn configure_timebase(&mut self, seconds_per_div: f64) -> Result<()>;

    /// Configure the MATH trace as a channel subtraction.
    fn configure_math_subtract(&mut self, order: MathOrder) -> Result<()>;

    /// Set the vertical scale of `source` in volts per division.
    fn set_vertical_scale(&mut self, source: TraceSource, volts_per_div: f64) -> Result<()>;

    /// Read the current vertical scale of `source` in volts per division.
    /// Returns `None` when the scope replies with something unparseable.
    fn read_vertical_scale(&mut self, source: TraceSource) -> Result<Option<f64>>;
}

/// The generator/scope pair a sweep drives, grouped as one object.
///
/// A sweep assumes exclusive ownership of both instruments for its whole
/// duration; nothing here is safe to share across threads mid-sweep.
#[derive(Debug)]
pub struct Bench<G, S> {
    /// Signal generator driving the DUT input.
    pub generator: G,
    /// Oscilloscope observing the DUT output.
    pub scope: S,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_source_parses_channels_and_math() {
        assert_eq!("1".parse::<TraceSource>().unwrap(), TraceSource::Channel(1));
        assert_eq!("ch3".parse::<TraceSource>().unwrap(), TraceSource::Channel(3));
        assert_eq!(" CH2 ".parse::<TraceSource>().unwrap(), TraceSource::Channel(2));
        assert_eq!("math".parse::<TraceSource>().unwrap(), TraceSource::Math);
    }

    #[test]
    fn trace_source_rejects_garbage() {
        assert!("".parse::<TraceSource>().is_err());
        assert!("CH5".parse::<TraceSource>().is_err());
        assert!("REF1".parse::<TraceSource>().is_err());
        assert!("0".parse::<TraceSource>().is_err());
    }

    #[test]
    fn trace_source_displays_scpi_labels() {
        assert_eq!(TraceSource::Channel(2).to_string(), "CH2");
        assert_eq!(TraceSource::Math.to_string(), "MATH");
    }

    #[test]
    fn math_order_round_trips() {
        let order: MathOrder = "ch2-ch1".parse().unwrap();
        assert_eq!(order, MathOrder::Ch2MinusCh1);
        assert_eq!(order.to_string(), "CH2-CH1");
        assert!("CH1-CH3".parse::<MathOrder>().is_err());
    }

    #[test]
    fn sine_setting_defaults() {
        let s = GeneratorSetting::sine(1000.0, 0.5);
        assert_eq!(s.shape, WaveShape::Sine);
        assert_eq!(s.offset_v, 0.0);
        assert_eq!(s.duty, None);
        assert_eq!(s.channel, 1);
    }
}
