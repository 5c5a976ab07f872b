//! Frequency-dependent amplitude calibration.
//!
//! A bench measurement chain (probe dividers, coupling networks, the DUT's
//! own input stage) has gain that varies with frequency. A calibration curve
//! captures that gain as `(frequency, ratio)` points where the ratio is
//! measured over reference amplitude; sweep drivers use it two ways:
//!
//! - [`CalibrationCurve::apply`] corrects a measured amplitude back to the
//!   true value at the DUT.
//! - [`CalibrationCurve::ratio_at`] pre-compensates the generator amplitude
//!   so the DUT sees a flat target level (`drive = target / ratio`).
//!
//! Curves are loaded once by the caller, then shared read-only across any
//! number of sweeps.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Errors raised while loading a calibration curve.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// The curve file could not be read.
    #[error("failed to read calibration file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A data line did not parse as `freq_hz,ratio`.
    #[error("bad calibration data in '{path}' line {line}: {reason}")]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The file held no data points at all.
    #[error("calibration file '{path}' contains no data points")]
    Empty {
        /// Path of the empty file.
        path: PathBuf,
    },
}

/// An immutable frequency-to-gain correction curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    /// `(freq_hz, ratio)` points, sorted ascending by frequency.
    points: Vec<(f64, f64)>,
}

impl CalibrationCurve {
    /// Build a curve from `(freq_hz, ratio)` points. Points are sorted by
    /// frequency; non-finite or non-positive frequencies are dropped.
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.retain(|(f, _)| f.is_finite() && *f > 0.0);
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("finite frequencies"));
        Self { points }
    }

    /// Load a curve from a two-column CSV (`freq_hz,ratio`). Blank lines,
    /// `#` comments, and a non-numeric header line are skipped.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| CalibrationError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let mut points = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| CalibrationError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split(',').map(str::trim);
            let (freq, ratio) = (fields.next(), fields.next());
            let parsed = freq
                .zip(ratio)
                .and_then(|(f, r)| Some((f.parse::<f64>().ok()?, r.parse::<f64>().ok()?)));
            match parsed {
                Some(point) => points.push(point),
                // Allow exactly one header line at the top of the file.
                None if i == 0 => continue,
                None => {
                    return Err(CalibrationError::Parse {
                        path: path.to_path_buf(),
                        line: i + 1,
                        reason: format!("expected 'freq_hz,ratio', got '{line}'"),
                    });
                }
            }
        }

        if points.is_empty() {
            return Err(CalibrationError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::new(points))
    }

    /// Number of points on the curve.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the curve holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Gain ratio at `freq_hz`, interpolated linearly in log-frequency and
    /// clamped to the end points. An empty curve reports unity gain.
    pub fn ratio_at(&self, freq_hz: f64) -> f64 {
        let points = &self.points;
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return 1.0;
        };
        if !freq_hz.is_finite() || freq_hz <= first.0 {
            return first.1;
        }
        if freq_hz >= last.0 {
            return last.1;
        }
        let hi = points.partition_point(|(f, _)| *f < freq_hz);
        let (f0, r0) = points[hi - 1];
        let (f1, r1) = points[hi];
        if f1 <= f0 {
            return r0;
        }
        let t = (freq_hz.log10() - f0.log10()) / (f1.log10() - f0.log10());
        r0 + t * (r1 - r0)
    }

    /// Correct a measured amplitude at `freq_hz` back to the true value.
    /// Non-finite amplitudes and non-positive ratios pass through unchanged.
    pub fn apply(&self, freq_hz: f64, amplitude: f64) -> f64 {
        if !amplitude.is_finite() {
            return amplitude;
        }
        let ratio = self.ratio_at(freq_hz);
        if ratio > 0.0 { amplitude / ratio } else { amplitude }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn curve() -> CalibrationCurve {
        CalibrationCurve::new(vec![(100.0, 1.0), (1000.0, 2.0), (10000.0, 4.0)])
    }

    #[test]
    fn ratio_interpolates_in_log_frequency() {
        let c = curve();
        // Geometric midpoint of 100..1000 is ~316.2 Hz -> halfway in ratio.
        assert!((c.ratio_at(1000.0_f64.sqrt() * 10.0) - 1.5).abs() < 1e-9);
        assert_eq!(c.ratio_at(1000.0), 2.0);
    }

    #[test]
    fn ratio_clamps_at_end_points() {
        let c = curve();
        assert_eq!(c.ratio_at(1.0), 1.0);
        assert_eq!(c.ratio_at(1e6), 4.0);
    }

    #[test]
    fn apply_divides_by_gain() {
        let c = curve();
        assert!((c.apply(1000.0, 2.0) - 1.0).abs() < 1e-12);
        assert!(c.apply(1000.0, f64::NAN).is_nan());
    }

    #[test]
    fn non_positive_ratio_passes_amplitude_through() {
        let c = CalibrationCurve::new(vec![(100.0, 0.0)]);
        assert_eq!(c.apply(100.0, 3.0), 3.0);
    }

    #[test]
    fn empty_curve_is_unity() {
        let c = CalibrationCurve::new(Vec::new());
        assert_eq!(c.ratio_at(123.0), 1.0);
        assert_eq!(c.apply(123.0, 3.0), 3.0);
    }

    #[test]
    fn csv_load_skips_header_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "freq_hz,ratio").unwrap();
        writeln!(file, "# probe divider curve").unwrap();
        writeln!(file, "100.0,1.0").unwrap();
        writeln!(file, "1000.0, 2.0").unwrap();
        let c = CalibrationCurve::from_csv(file.path()).unwrap();
        assert_eq!(c.ratio_at(100.0), 1.0);
        assert_eq!(c.ratio_at(1000.0), 2.0);
    }

    #[test]
    fn csv_load_rejects_malformed_data_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "100.0,1.0").unwrap();
        writeln!(file, "oops").unwrap();
        let err = CalibrationCurve::from_csv(file.path()).unwrap_err();
        assert!(matches!(err, CalibrationError::Parse { line: 2, .. }));
    }

    #[test]
    fn csv_load_rejects_empty_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = CalibrationCurve::from_csv(file.path()).unwrap_err();
        assert!(matches!(err, CalibrationError::Empty { .. }));
    }
}
