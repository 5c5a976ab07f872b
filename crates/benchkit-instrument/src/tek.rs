//! Tektronix oscilloscope driver, SCPI over a raw TCP socket.
//!
//! Talks to TDS/TBS-class scopes exposed via an LXI raw socket or a
//! VISA-to-TCP bridge. Waveform transfer uses `CURVE?` with signed 8-bit
//! binary encoding and the `WFMPRE` preamble fields for vertical/horizontal
//! calibration.

use crate::{Capture, InstrumentError, MathOrder, Oscilloscope, Result, TraceSource};
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decode an IEEE-488.2 definite-length block (`#<n><len><payload>`) into
/// signed 8-bit samples.
///
/// Some firmware replies to `CURVE?` in ASCII mode with a bare
/// comma-separated list; that form is accepted as a fallback.
pub fn parse_ieee_block(block: &[u8]) -> Vec<i8> {
    if block.is_empty() {
        return Vec::new();
    }
    if block[0] != b'#' {
        // Bare ASCII numeric list fallback.
        let Ok(text) = std::str::from_utf8(block) else {
            return Vec::new();
        };
        return text
            .trim()
            .split(',')
            .filter_map(|part| part.trim().parse::<i8>().ok())
            .collect();
    }
    if block.len() < 2 {
        return Vec::new();
    }
    let n_dig = (block[1] as char).to_digit(10).unwrap_or(0) as usize;
    let header = 2 + n_dig;
    if n_dig == 0 || block.len() < header {
        return Vec::new();
    }
    let Ok(len_text) = std::str::from_utf8(&block[2..header]) else {
        return Vec::new();
    };
    let Ok(n_bytes) = len_text.parse::<usize>() else {
        return Vec::new();
    };
    block[header..]
        .iter()
        .take(n_bytes)
        .map(|&b| b as i8)
        .collect()
}

/// Driver for a Tektronix scope reachable at a TCP address.
pub struct TekScope {
    writer: BufWriter<TcpStream>,
    reader: BufReader<TcpStream>,
    address: String,
}

impl TekScope {
    /// Connect to the scope at `address` (e.g. `"192.168.1.40:4000"`).
    pub fn connect(address: &str) -> Result<Self> {
        let addrs: Vec<_> = address
            .to_socket_addrs()
            .map_err(|e| InstrumentError::Open {
                resource: address.to_string(),
                reason: e.to_string(),
            })?
            .collect();
        let stream = addrs
            .iter()
            .find_map(|a| TcpStream::connect_timeout(a, Duration::from_secs(5)).ok())
            .ok_or_else(|| InstrumentError::Open {
                resource: address.to_string(),
                reason: "no reachable address".to_string(),
            })?;
        stream.set_read_timeout(Some(Duration::from_secs(15)))?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;
        let reader = BufReader::new(stream.try_clone()?);
        let mut scope = Self {
            writer: BufWriter::new(stream),
            reader,
            address: address.to_string(),
        };
        scope.write_line("HEADER OFF")?;
        Ok(scope)
    }

    /// Address this driver connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn write_line(&mut self, command: &str) -> Result<()> {
        tracing::trace!(command, "scpi write");
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.reader.read_exact(&mut byte)?;
            if byte[0] == b'\n' {
                break;
            }
            bytes.push(byte[0]);
        }
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.write_line(command)?;
        self.read_line()
    }

    fn query_f64(&mut self, command: &str) -> Result<f64> {
        let reply = self.query(command)?;
        reply.parse::<f64>().map_err(|_| InstrumentError::BadReply {
            query: command.to_string(),
            reply,
        })
    }

    /// Issue `CURVE?` and read back the full binary block.
    fn read_curve_block(&mut self) -> Result<Vec<u8>> {
        self.write_line("CURVE?")?;
        let mut head = [0u8; 2];
        self.reader.read_exact(&mut head)?;
        if head[0] != b'#' {
            // ASCII fallback: the two bytes read are the start of the line.
            let mut line = head.to_vec();
            let mut byte = [0u8; 1];
            loop {
                self.reader.read_exact(&mut byte)?;
                if byte[0] == b'\n' {
                    break;
                }
                line.push(byte[0]);
            }
            return Ok(line);
        }
        let n_dig = (head[1] as char).to_digit(10).unwrap_or(0) as usize;
        let mut len_field = vec![0u8; n_dig];
        self.reader.read_exact(&mut len_field)?;
        let n_bytes = std::str::from_utf8(&len_field)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| InstrumentError::BadReply {
                query: "CURVE?".to_string(),
                reply: String::from_utf8_lossy(&len_field).to_string(),
            })?;
        let mut payload = vec![0u8; n_bytes];
        self.reader.read_exact(&mut payload)?;
        // Consume the trailing terminator, tolerating its absence.
        let mut byte = [0u8; 1];
        let _ = self.reader.read_exact(&mut byte);

        let mut block = head.to_vec();
        block.extend_from_slice(&len_field);
        block.extend_from_slice(&payload);
        Ok(block)
    }

    fn setup_source(&mut self, source: TraceSource) -> Result<()> {
        self.write_line(&format!("DATA:SOURCE {source}"))?;
        self.write_line("DATa:ENCdg RIBinary;WIDth 1")?;
        self.write_line("DATA:START 1")?;
        self.write_line("HORIZONTAL:RECORDLENGTH 10000")?;
        self.write_line("ACQUIRE:STOPAFTER SEQUENCE")?;
        self.write_line("ACQUIRE:STATE RUN")?;
        Ok(())
    }

    fn vertical_scale_command(source: TraceSource) -> String {
        match source {
            TraceSource::Math => "MATH:VERTICAL:SCALE".to_string(),
            ch => format!("{ch}:SCALE"),
        }
    }
}

impl Oscilloscope for TekScope {
    fn capture_calibrated(&mut self, source: TraceSource, timeout: Duration) -> Result<Capture> {
        self.writer.get_ref().set_read_timeout(Some(timeout))?;
        self.setup_source(source)?;

        let ymult = self.query_f64("WFMPRE:YMULT?")?;
        let yzero = self.query_f64("WFMPRE:YZERO?")?;
        let yoff = self.query_f64("WFMPRE:YOFF?")?;
        let xincr = self.query_f64("WFMPRE:XINCR?")?;
        let xzero = self.query_f64("WFMPRE:XZERO?").unwrap_or(0.0);

        let block = self.read_curve_block()?;
        let raw = parse_ieee_block(&block);

        let volts: Vec<f64> = raw
            .iter()
            .map(|&code| (f64::from(code) - yoff) * ymult + yzero)
            .collect();
        let times: Vec<f64> = (0..raw.len()).map(|i| xzero + i as f64 * xincr).collect();
        Ok(Capture { times, volts })
    }

    fn arm_single(&mut self) -> Result<()> {
        self.write_line("ACQuire:STOPAfter SEQuence")?;
        self.write_line("ACQuire:STATE RUN")
    }

    fn wait_single_complete(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let state = self.query("ACQuire:STATE?")?;
            match state.as_str() {
                "0" | "STOP" | "STOPPED" => return Ok(true),
                "1" | "RUN" | "RUNNING" => {}
                _ => {
                    let trig = self.query("TRIGger:STATE?")?.to_ascii_uppercase();
                    if matches!(trig.as_str(), "TRIGGERED" | "STOP" | "SAVE") {
                        return Ok(true);
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(false)
    }

    fn resume_run(&mut self) -> Result<()> {
        self.write_line("ACQuire:STOPAfter RUNSTop")?;
        self.write_line("ACQuire:STATE RUN")
    }

    fn configure_timebase(&mut self, seconds_per_div: f64) -> Result<()> {
        self.write_line("HORizontal:MODE MAIn")?;
        self.write_line(&format!("HORizontal:MAIn:SCAle {seconds_per_div}"))
    }

    fn configure_math_subtract(&mut self, order: MathOrder) -> Result<()> {
        let (a, b) = order.operands();
        self.write_line("MATH:STATE ON")?;
        self.write_line(&format!("MATH:DEFINE {order}"))?;
        self.write_line("MATH:OPERation SUBtract")?;
        self.write_line(&format!("MATH:SOURCE1 {a}"))?;
        self.write_line(&format!("MATH:SOURCE2 {b}"))
    }

    fn set_vertical_scale(&mut self, source: TraceSource, volts_per_div: f64) -> Result<()> {
        // The scope rejects zero/negative scales outright.
        let value = volts_per_div.max(1e-6);
        let command = Self::vertical_scale_command(source);
        self.write_line(&format!("{command} {value}"))
    }

    fn read_vertical_scale(&mut self, source: TraceSource) -> Result<Option<f64>> {
        let command = Self::vertical_scale_command(source);
        let reply = self.query(&format!("{command}?"))?;
        Ok(reply.parse::<f64>().ok())
    }
}
