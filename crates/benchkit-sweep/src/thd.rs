//! THD vs frequency sweep driver.

use crate::calibration::CalibrationCurve;
use crate::kpi::{AutoScale, KpiAnalysis, KpiSweep};
use crate::spike::{SpikeFilterConfig, Suppression, ThdPoint, filter_spikes};
use crate::{Result, SweepError, best_effort, report};
use benchkit_dsp::{PointSpacing, build_freq_points};
use benchkit_instrument::{Bench, GeneratorSetting, MathOrder, Oscilloscope, SignalGenerator, TraceSource};
use std::path::PathBuf;
use std::time::Duration;

/// Harmonics summed into the THD estimate, fundamental included.
const THD_HARMONICS: usize = 10;

/// Configuration of a THD sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ThdSweepConfig {
    /// Generator amplitude in Vpp.
    pub amp_vpp: f64,
    /// When set, pre-compensate the generator per point so the DUT output
    /// lands on this Vpp. Requires a calibration curve.
    pub calibrate_to_vpp: Option<f64>,
    /// Sweep start frequency in Hz.
    pub start_hz: f64,
    /// Sweep stop frequency in Hz.
    pub stop_hz: f64,
    /// Number of log-spaced sweep points (>= 2).
    pub points: usize,
    /// Settle delay after each generator update, in seconds.
    pub dwell_s: f64,
    /// Scope source to measure: a channel or the MATH subtraction trace.
    pub source: TraceSource,
    /// Operand order when `source` is the MATH trace.
    pub math_order: MathOrder,
    /// Generator output channel driving the DUT.
    pub drive_channel: u8,
    /// Optional CSV output path; parent directories are created.
    pub output: Option<PathBuf>,
    /// Idle tone frequency restored after the sweep.
    pub post_freq_hz: f64,
    /// Idle timebase restored after the sweep, seconds/div. `None` leaves
    /// the timebase alone.
    pub post_seconds_per_div: Option<f64>,
    /// Spike suppression; `None` disables filtering.
    pub spike_filter: Option<SpikeFilterConfig>,
    /// Vertical auto-scale; `None` leaves the scope scales alone.
    pub auto_scale: Option<AutoScale>,
    /// Per-capture transfer timeout.
    pub capture_timeout: Duration,
    /// Wait limit for each armed single acquisition.
    pub single_timeout: Duration,
}

impl Default for ThdSweepConfig {
    fn default() -> Self {
        Self {
            amp_vpp: 0.5,
            calibrate_to_vpp: None,
            start_hz: 20.0,
            stop_hz: 20_000.0,
            points: 61,
            dwell_s: 0.15,
            source: TraceSource::Channel(1),
            math_order: MathOrder::default(),
            drive_channel: 1,
            output: None,
            post_freq_hz: 1000.0,
            post_seconds_per_div: Some(1e-4),
            spike_filter: Some(SpikeFilterConfig::default()),
            auto_scale: None,
            capture_timeout: Duration::from_secs(15),
            single_timeout: Duration::from_secs(3),
        }
    }
}

/// Result of a completed THD sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ThdSweepOutcome {
    /// Processed rows, one per sweep point in frequency order.
    pub rows: Vec<ThdPoint>,
    /// CSV path when output was requested.
    pub csv_path: Option<PathBuf>,
    /// Spike suppressions applied, in sweep order.
    pub suppressions: Vec<Suppression>,
}

/// Validation shared by both sweep drivers. Runs before any instrument I/O.
pub(crate) fn validate_common(
    points: usize,
    amp_vpp: f64,
    dwell_s: f64,
    calibrate_to_vpp: Option<f64>,
    calibration: Option<&CalibrationCurve>,
) -> Result<()> {
    if points < 2 {
        return Err(SweepError::Config("points must be >= 2".to_string()));
    }
    if !amp_vpp.is_finite() || amp_vpp <= 0.0 {
        return Err(SweepError::Config("amp_vpp must be > 0".to_string()));
    }
    if !dwell_s.is_finite() || dwell_s < 0.0 {
        return Err(SweepError::Config("dwell_s must be >= 0".to_string()));
    }
    if calibrate_to_vpp.is_some() && calibration.is_none() {
        return Err(SweepError::Config(
            "calibrate_to_vpp requires a calibration curve".to_string(),
        ));
    }
    Ok(())
}

/// Per-frequency generator amplitude for calibrated-target sweeps:
/// `target / ratio`, falling back to `target` when the ratio is non-positive
/// so a degenerate curve never divides toward infinity.
pub(crate) fn amp_strategy(
    target: f64,
    curve: &CalibrationCurve,
) -> impl Fn(f64) -> f64 {
    move |freq_hz| {
        let ratio = curve.ratio_at(freq_hz);
        if ratio <= 0.0 { target } else { target / ratio }
    }
}

/// Apply calibration correction to a measured value, NaN passing through.
pub(crate) fn correct(curve: Option<&CalibrationCurve>, freq_hz: f64, value: f64) -> f64 {
    match curve {
        Some(curve) if value.is_finite() => curve.apply(freq_hz, value),
        _ => value,
    }
}

/// Run a THD sweep capturing either a single scope channel or the MATH trace.
///
/// Returns the processed rows, the CSV path when one was written, and the
/// spike suppressions applied. The generator is restored to an idle sine at
/// `post_freq_hz` and the scope returned to free-running acquisition on the
/// way out, best-effort.
pub fn thd_sweep<G, S>(
    bench: &mut Bench<G, S>,
    config: &ThdSweepConfig,
    calibration: Option<&CalibrationCurve>,
) -> Result<ThdSweepOutcome>
where
    G: SignalGenerator,
    S: Oscilloscope,
{
    validate_common(
        config.points,
        config.amp_vpp,
        config.dwell_s,
        config.calibrate_to_vpp,
        calibration,
    )?;

    let freqs = build_freq_points(config.start_hz, config.stop_hz, config.points, PointSpacing::Log);

    let strategy = config
        .calibrate_to_vpp
        .zip(calibration)
        .map(|(target, curve)| amp_strategy(target, curve));
    let sweep_amp = config.calibrate_to_vpp.unwrap_or(config.amp_vpp);

    let kpi = KpiSweep {
        freqs: &freqs,
        amp_vpp: sweep_amp,
        amp_for: strategy.as_ref().map(|s| s as &dyn Fn(f64) -> f64),
        drive_channel: config.drive_channel,
        dwell_s: config.dwell_s,
        source: config.source,
        math_order: config.math_order,
        auto_scale: config.auto_scale.as_ref(),
        capture_timeout: config.capture_timeout,
        single_timeout: config.single_timeout,
        analysis: KpiAnalysis::Thd {
            nharm: THD_HARMONICS,
        },
    };
    let outcome = kpi.run(bench)?;

    let mut rows: Vec<ThdPoint> = outcome
        .rows
        .iter()
        .map(|row| ThdPoint {
            freq_hz: row.freq_hz,
            vrms: correct(calibration, row.freq_hz, row.vrms),
            vpp: correct(calibration, row.freq_hz, row.vpp),
            thd_percent: row.thd_percent,
        })
        .collect();

    let mut suppressions = Vec::new();
    if let Some(filter) = &config.spike_filter
        && !rows.is_empty()
    {
        (rows, suppressions) = filter_spikes(&rows, filter);
    }

    let csv_path = match &config.output {
        Some(path) => {
            report::write_thd_csv(path, &rows)?;
            Some(path.clone())
        }
        None => None,
    };

    // Leave the bench in a predictable idle state for quick follow-up work.
    // Nothing past this point may fail a sweep whose data is already in hand.
    best_effort("resuming scope acquisition", bench.scope.resume_run());
    let mut idle = GeneratorSetting::sine(config.post_freq_hz, config.amp_vpp);
    idle.channel = config.drive_channel;
    best_effort(
        &format!(
            "generator idle restore to {:.1} Hz at {:.2} Vpp",
            config.post_freq_hz, config.amp_vpp
        ),
        bench.generator.apply(&idle),
    );
    if let Some(seconds_per_div) = config.post_seconds_per_div {
        best_effort(
            &format!("scope timebase restore to {seconds_per_div} s/div"),
            bench.scope.configure_timebase(seconds_per_div),
        );
    }

    Ok(ThdSweepOutcome {
        rows,
        csv_path,
        suppressions,
    })
}

/// Render THD rows as human-readable lines for terminal output.
pub fn format_thd_rows(rows: &[ThdPoint]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            if row.thd_percent.is_nan() {
                format!("{:8.2} Hz -> THD NaN", row.freq_hz)
            } else {
                format!("{:8.2} Hz -> THD {:6.3}%", row.freq_hz, row.thd_percent)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_bench_conventions() {
        let cfg = ThdSweepConfig::default();
        assert_eq!(cfg.amp_vpp, 0.5);
        assert_eq!(cfg.points, 61);
        assert_eq!(cfg.post_freq_hz, 1000.0);
        assert_eq!(cfg.post_seconds_per_div, Some(1e-4));
        assert!(cfg.spike_filter.is_some());
    }

    #[test]
    fn validation_messages() {
        assert!(matches!(
            validate_common(1, 0.5, 0.0, None, None),
            Err(SweepError::Config(msg)) if msg.contains("points")
        ));
        assert!(matches!(
            validate_common(3, 0.0, 0.0, None, None),
            Err(SweepError::Config(msg)) if msg.contains("amp_vpp")
        ));
        assert!(matches!(
            validate_common(3, 0.5, f64::NAN, None, None),
            Err(SweepError::Config(msg)) if msg.contains("dwell")
        ));
        assert!(matches!(
            validate_common(3, 0.5, 0.0, Some(1.0), None),
            Err(SweepError::Config(msg)) if msg.contains("calibration")
        ));
        assert!(validate_common(3, 0.5, 0.0, None, None).is_ok());
    }

    #[test]
    fn amp_strategy_pre_compensates() {
        let curve = CalibrationCurve::new(vec![(100.0, 2.0)]);
        let strategy = amp_strategy(1.0, &curve);
        assert!((strategy(100.0) - 0.5).abs() < 1e-12);

        let flat = CalibrationCurve::new(vec![(100.0, 0.0)]);
        let strategy = amp_strategy(1.0, &flat);
        assert_eq!(strategy(100.0), 1.0);
    }

    #[test]
    fn row_formatting_is_nan_aware() {
        let rows = vec![
            ThdPoint { freq_hz: 1000.0, vrms: 1.0, vpp: 2.0, thd_percent: 0.812 },
            ThdPoint { freq_hz: 2000.0, vrms: 1.0, vpp: 2.0, thd_percent: f64::NAN },
        ];
        let lines = format_thd_rows(&rows);
        assert_eq!(lines[0], " 1000.00 Hz -> THD  0.812%");
        assert_eq!(lines[1], " 2000.00 Hz -> THD NaN");
    }
}
