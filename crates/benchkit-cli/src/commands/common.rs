//! Shared CLI helpers used by both sweep commands.

use benchkit_instrument::fy::{FyGenerator, FyProtocol};
use benchkit_instrument::tek::TekScope;
use benchkit_instrument::{Bench, MathOrder, TraceSource};
use benchkit_sweep::{AutoScale, CalibrationCurve};
use clap::Args;
use std::path::PathBuf;

/// Instrument connection arguments shared by every sweep command.
#[derive(Args)]
pub struct BenchArgs {
    /// Serial port of the FeelTech generator
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub fy_port: String,

    /// Generator protocol variant: 9600 (FY3200S) or 115200 (FY6800/6900)
    #[arg(long, default_value = "9600")]
    pub fy_proto: FyProtocol,

    /// Tektronix scope socket address (host:port)
    #[arg(long, default_value = "192.168.1.40:4000")]
    pub scope_addr: String,
}

impl BenchArgs {
    /// Open both instruments and bundle them as a bench.
    pub fn open(&self) -> anyhow::Result<Bench<FyGenerator, TekScope>> {
        tracing::info!(port = %self.fy_port, proto = ?self.fy_proto, "opening generator");
        let generator = FyGenerator::open(&self.fy_port, self.fy_proto)?;
        tracing::info!(addr = %self.scope_addr, "connecting scope");
        let scope = TekScope::connect(&self.scope_addr)?;
        Ok(Bench { generator, scope })
    }
}

/// Sweep shape and measurement arguments shared by both commands.
#[derive(Args)]
pub struct SweepArgs {
    /// Drive amplitude in Vpp
    #[arg(long, default_value = "0.5")]
    pub amp: f64,

    /// Sweep start frequency in Hz
    #[arg(long, default_value = "20")]
    pub start: f64,

    /// Sweep stop frequency in Hz
    #[arg(long, default_value = "20000")]
    pub stop: f64,

    /// Number of log-spaced sweep points
    #[arg(long, default_value = "61")]
    pub points: usize,

    /// Settle delay after each generator update, seconds
    #[arg(long, default_value = "0.15")]
    pub dwell: f64,

    /// Scope source to measure: CH1..CH4 or MATH
    #[arg(long, default_value = "CH1")]
    pub source: TraceSource,

    /// MATH operand order when --source MATH (ch1-ch2 or ch2-ch1)
    #[arg(long, default_value = "ch1-ch2")]
    pub math_order: MathOrder,

    /// Generator output channel driving the amplifier
    #[arg(long, default_value = "1")]
    pub channel: u8,

    /// Output CSV path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Calibration CSV (freq_hz,ratio) applied to measured voltages
    #[arg(long)]
    pub cal_file: Option<PathBuf>,

    /// Pre-compensate the generator so the output lands on this Vpp
    /// (requires --cal-file)
    #[arg(long)]
    pub calibrate_to: Option<f64>,

    /// Vertical auto-scale gains, e.g. "CH1=10,MATH=2"
    #[arg(long, value_parser = parse_gain, value_delimiter = ',')]
    pub auto_scale: Vec<(String, f64)>,

    /// Auto-scale headroom factor
    #[arg(long, default_value = "1.25")]
    pub scale_margin: f64,

    /// Smallest volts/div auto-scale will command
    #[arg(long, default_value = "0.001")]
    pub min_scale: f64,
}

impl SweepArgs {
    /// Build the auto-scale settings, or `None` when no gains were given.
    pub fn auto_scale(&self) -> Option<AutoScale> {
        if self.auto_scale.is_empty() {
            return None;
        }
        Some(AutoScale {
            gains: self.auto_scale.clone(),
            margin: self.scale_margin,
            min_volts_per_div: self.min_scale,
            ..AutoScale::default()
        })
    }

    /// Load the calibration curve when one was requested.
    pub fn calibration(&self) -> anyhow::Result<Option<CalibrationCurve>> {
        match &self.cal_file {
            Some(path) => {
                let curve = CalibrationCurve::from_csv(path)?;
                tracing::info!(path = %path.display(), points = curve.len(), "calibration loaded");
                Ok(Some(curve))
            }
            None => Ok(None),
        }
    }
}

/// Parse a `SOURCE=gain` auto-scale entry for clap's `value_parser`.
fn parse_gain(s: &str) -> Result<(String, f64), String> {
    let (label, gain) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid scale entry '{s}' (expected SOURCE=gain)"))?;
    let gain: f64 = gain
        .trim()
        .parse()
        .map_err(|_| format!("invalid gain in '{s}'"))?;
    Ok((label.trim().to_string(), gain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_entries_parse() {
        assert_eq!(parse_gain("CH1=10"), Ok(("CH1".to_string(), 10.0)));
        assert_eq!(parse_gain(" MATH = 2.5 "), Ok(("MATH".to_string(), 2.5)));
        assert!(parse_gain("CH1").is_err());
        assert!(parse_gain("CH1=ten").is_err());
    }
}
