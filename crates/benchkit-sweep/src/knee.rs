//! Bandwidth knee sweep driver.
//!
//! Sweeps amplitude vs frequency and estimates the -dB bandwidth edges. The
//! raw Vpp series is sanitized, optionally smoothed, and optionally forced
//! monotonic around the reference point before the knee detector runs -
//! ripple near a knee would otherwise give ill-defined crossings.

use crate::calibration::CalibrationCurve;
use crate::kpi::{AutoScale, KpiAnalysis, KpiSweep};
use crate::series::{Smoothing, monotonic_envelope, sanitize_amplitudes, smooth_series};
use crate::thd::{amp_strategy, correct, validate_common};
use crate::{Result, SweepError, best_effort, report};
use benchkit_dsp::{KneeResult, PointSpacing, RefMode, build_freq_points, db_from_amplitude, find_knees, reference_index};
use benchkit_instrument::{Bench, GeneratorSetting, MathOrder, Oscilloscope, SignalGenerator, TraceSource};
use std::path::PathBuf;
use std::time::Duration;

/// Idle tone restored after a knee sweep.
const IDLE_FREQ_HZ: f64 = 1000.0;

/// Configuration of a knee sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct KneeSweepConfig {
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
    /// Drop below the reference level that defines a knee, in dB (> 0).
    pub knee_drop_db: f64,
    /// How the 0 dB reference point is chosen.
    pub ref_mode: RefMode,
    /// Target frequency for [`RefMode::Freq`].
    pub ref_hz: f64,
    /// Rolling smoother applied before knee detection.
    pub smoothing: Smoothing,
    /// Smoother window in points.
    pub smooth_window: usize,
    /// Force the series monotonic around the reference before detection.
    pub enforce_monotonic: bool,
    /// Vertical auto-scale; `None` leaves the scope scales alone.
    pub auto_scale: Option<AutoScale>,
    /// Per-capture transfer timeout.
    pub capture_timeout: Duration,
    /// Wait limit for each armed single acquisition.
    pub single_timeout: Duration,
}

impl Default for KneeSweepConfig {
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
            knee_drop_db: 3.0,
            ref_mode: RefMode::Max,
            ref_hz: 1000.0,
            smoothing: Smoothing::Median,
            smooth_window: 5,
            enforce_monotonic: true,
            auto_scale: None,
            capture_timeout: Duration::from_secs(15),
            single_timeout: Duration::from_secs(3),
        }
    }
}

/// One knee sweep row: amplitude relative to the reference level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KneePoint {
    /// Stimulus frequency in Hz.
    pub freq_hz: f64,
    /// Measured RMS voltage, calibration-corrected.
    pub vrms: f64,
    /// Measured peak-to-peak voltage, calibration-corrected.
    pub vpp: f64,
    /// `20*log10(vpp) - ref_db`; `-inf` when no knees were found or the
    /// point has no usable amplitude.
    pub rel_db: f64,
}

/// Result of a completed knee sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct KneeSweepOutcome {
    /// Rows in frequency order.
    pub rows: Vec<KneePoint>,
    /// The detected knees, when the response yielded any.
    pub knees: Option<KneeResult>,
    /// Reference level in dB (NaN when no knees were found).
    pub ref_db: f64,
    /// `ref_db - knee_drop_db` (NaN when no knees were found).
    pub target_db: f64,
    /// CSV path when output was requested.
    pub csv_path: Option<PathBuf>,
}

/// Run an amplitude sweep and estimate the -dB bandwidth knees.
///
/// The generator is restored to a 1 kHz idle sine at the configured
/// amplitude on the way out (best-effort); the timebase is left alone.
pub fn knee_sweep<G, S>(
    bench: &mut Bench<G, S>,
    config: &KneeSweepConfig,
    calibration: Option<&CalibrationCurve>,
) -> Result<KneeSweepOutcome>
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
    if !config.knee_drop_db.is_finite() || config.knee_drop_db <= 0.0 {
        return Err(SweepError::Config("knee_drop_db must be > 0".to_string()));
    }

    let freqs = build_freq_points(config.start_hz, config.stop_hz, config.points, PointSpacing::Log);

    let strategy = config
        .calibrate_to_vpp
        .zip(calibration)
        .map(|(target, curve)| amp_strategy(target, curve));
    let sweep_amp = config.calibrate_to_vpp.unwrap_or(config.amp_vpp);

    let detector = |freq_list: &[f64], amps: &[f64]| -> Option<KneeResult> {
        let corrected: Vec<f64> = freq_list
            .iter()
            .zip(amps)
            .map(|(&f, &a)| correct(calibration, f, a))
            .collect();
        let mut cleaned = sanitize_amplitudes(&corrected);
        if config.smoothing != Smoothing::None && cleaned.len() > 1 && config.smooth_window > 1 {
            cleaned = smooth_series(&cleaned, config.smooth_window, config.smoothing);
        }
        if config.enforce_monotonic && cleaned.len() > 2 {
            let ref_idx = reference_index(freq_list, &cleaned, config.ref_mode, config.ref_hz);
            cleaned = monotonic_envelope(&cleaned, ref_idx);
        }
        find_knees(freq_list, &cleaned, config.ref_mode, config.ref_hz, config.knee_drop_db)
    };

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
        analysis: KpiAnalysis::Knees {
            detector: &detector,
        },
    };
    let outcome = kpi.run(bench)?;

    let knees = outcome.knees;
    let (ref_db, target_db) = match &knees {
        Some(k) => (k.ref_db, k.ref_db - config.knee_drop_db),
        None => (f64::NAN, f64::NAN),
    };

    let rows: Vec<KneePoint> = outcome
        .rows
        .iter()
        .map(|row| {
            let vrms = correct(calibration, row.freq_hz, row.vrms);
            let vpp = correct(calibration, row.freq_hz, row.vpp);
            let rel_db = if knees.is_some() && vpp.is_finite() && vpp > 0.0 && ref_db.is_finite()
            {
                db_from_amplitude(vpp) - ref_db
            } else {
                f64::NEG_INFINITY
            };
            KneePoint {
                freq_hz: row.freq_hz,
                vrms,
                vpp,
                rel_db,
            }
        })
        .collect();

    let csv_path = match &config.output {
        Some(path) => {
            report::write_knee_csv(path, &rows)?;
            Some(path.clone())
        }
        None => None,
    };

    best_effort("resuming scope acquisition", bench.scope.resume_run());
    let mut idle = GeneratorSetting::sine(IDLE_FREQ_HZ, config.amp_vpp);
    idle.channel = config.drive_channel;
    best_effort(
        &format!(
            "generator idle restore to {IDLE_FREQ_HZ:.1} Hz at {:.2} Vpp",
            config.amp_vpp
        ),
        bench.generator.apply(&idle),
    );

    Ok(KneeSweepOutcome {
        rows,
        knees,
        ref_db,
        target_db,
        csv_path,
    })
}
