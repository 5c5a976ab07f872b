//! Benchkit sweep core - frequency sweep orchestration and post-processing.
//!
//! This crate drives a signal generator and oscilloscope through a frequency
//! sweep of an amplifier under test, collects per-point measurements, and
//! turns them into THD curves or -dB bandwidth knee estimates:
//!
//! - [`thd_sweep`] - THD vs frequency, with outlier spike suppression
//! - [`knee_sweep`] - amplitude vs frequency with bandwidth knee detection
//! - [`series`] - the numeric cleanup chain knee detection runs on
//!   (sanitize, smooth, monotonic envelope)
//! - [`spike`] - local-median THD spike filter
//! - [`calibration`] - frequency-dependent amplitude correction curves
//! - [`report`] - CSV output
//!
//! Sweeps run synchronously on the calling thread, one point at a time, and
//! assume exclusive ownership of the bench for their whole duration. A
//! measurement-path instrument failure aborts the sweep with an error and
//! writes no CSV; the post-sweep idle restore is best-effort and only ever
//! logs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use benchkit_instrument::{Bench, fy::FyGenerator, tek::TekScope};
//! use benchkit_sweep::{ThdSweepConfig, thd_sweep};
//!
//! let mut bench = Bench {
//!     generator: FyGenerator::open("/dev/ttyUSB0", Default::default())?,
//!     scope: TekScope::connect("192.168.1.40:4000")?,
//! };
//! let outcome = thd_sweep(&mut bench, &ThdSweepConfig::default(), None)?;
//! for row in &outcome.rows {
//!     println!("{:8.2} Hz  THD {:6.3}%", row.freq_hz, row.thd_percent);
//! }
//! ```

pub mod calibration;
pub mod kpi;
pub mod knee;
pub mod report;
pub mod series;
pub mod spike;
pub mod thd;

use std::path::PathBuf;

pub use benchkit_dsp::{KneeResult, RefMode};
pub use calibration::CalibrationCurve;
pub use knee::{KneePoint, KneeSweepConfig, KneeSweepOutcome, knee_sweep};
pub use kpi::{AutoScale, KpiRow};
pub use series::{Smoothing, monotonic_envelope, sanitize_amplitudes, smooth_series};
pub use spike::{SpikeFilterConfig, Suppression, ThdPoint, filter_spikes};
pub use thd::{ThdSweepConfig, ThdSweepOutcome, format_thd_rows, thd_sweep};

/// Error types for sweep runs.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// A sweep parameter failed validation. Raised before any instrument
    /// I/O; the bench is untouched.
    #[error("invalid sweep configuration: {0}")]
    Config(String),

    /// An instrument failed on the measurement path. The sweep aborts with
    /// whatever state the bench was left in; no CSV is written.
    #[error(transparent)]
    Instrument(#[from] benchkit_instrument::InstrumentError),

    /// The output CSV could not be written.
    #[error("failed to write sweep CSV '{path}': {source}")]
    Csv {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Run a cleanup/restore step that must never fail the sweep.
///
/// Logs the error at warn level with the given context and discards it.
pub(crate) fn best_effort<T, E: std::fmt::Display>(
    context: &str,
    result: std::result::Result<T, E>,
) {
    if let Err(err) = result {
        tracing::warn!("{context} failed: {err}");
    }
}
