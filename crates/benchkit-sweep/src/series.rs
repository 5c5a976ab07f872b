//! Amplitude series cleanup for knee detection.
//!
//! Real sweep data near a bandwidth knee carries ripple from resonances and
//! measurement noise, plus the occasional failed capture (NaN). Knee
//! detection needs a strictly positive, reasonably smooth, monotonic-around-
//! the-peak series to produce a well-defined crossing, so the raw amplitudes
//! go through up to three stages before the detector sees them:
//!
//! 1. [`sanitize_amplitudes`] - force strictly positive finite values
//! 2. [`smooth_series`] - centered rolling median/mean
//! 3. [`monotonic_envelope`] - running-maximum walk toward the reference

use std::str::FromStr;

/// Rolling smoother applied to the amplitude series before knee detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    /// Centered rolling median, the default - robust to single-point spikes.
    #[default]
    Median,
    /// Centered rolling mean.
    Mean,
    /// No smoothing.
    None,
}

impl FromStr for Smoothing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median" => Ok(Self::Median),
            "mean" => Ok(Self::Mean),
            "none" => Ok(Self::None),
            other => Err(format!(
                "smoothing must be one of 'median', 'mean', or 'none', got '{other}'"
            )),
        }
    }
}

/// Force an amplitude series to strictly positive finite values.
///
/// Valid samples (finite, nonzero) contribute their magnitude and become the
/// new "last good" value; invalid samples (NaN, infinite, exactly zero) are
/// replaced by the last good value so the series keeps its length and its
/// position-to-frequency alignment. Before any valid sample is seen the last
/// good value is `1e-12` - not physically meaningful, just small enough to
/// read as "no signal" in downstream dB math.
pub fn sanitize_amplitudes(amps: &[f64]) -> Vec<f64> {
    let mut last_good = 1e-12;
    amps.iter()
        .map(|&amp| {
            if amp.is_finite() && amp != 0.0 {
                last_good = amp.abs();
            }
            last_good
        })
        .collect()
}

fn median_of(sorted: &mut [f64]) -> f64 {
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Smooth a series with a centered rolling reducer.
///
/// The window is coerced to the nearest odd value so it is symmetric around
/// each index (even values are incremented); edges are handled by
/// replicating the first/last element outward rather than shrinking the
/// window. The reducer runs over the magnitudes of the finite entries in
/// each window; a window with no finite entries yields NaN at that position.
///
/// A window of 1 or less, an empty input, or [`Smoothing::None`] returns an
/// unmodified copy.
pub fn smooth_series(values: &[f64], window: usize, mode: Smoothing) -> Vec<f64> {
    let n = values.len();
    if n == 0 || window <= 1 || mode == Smoothing::None {
        return values.to_vec();
    }

    let win = if window % 2 == 0 { window + 1 } else { window };
    let half = win / 2;

    let mut padded = Vec::with_capacity(n + 2 * half);
    padded.extend(std::iter::repeat_n(values[0], half));
    padded.extend_from_slice(values);
    padded.extend(std::iter::repeat_n(values[n - 1], half));

    (0..n)
        .map(|i| {
            let mut finite: Vec<f64> = padded[i..i + win]
                .iter()
                .filter(|v| v.is_finite())
                .map(|v| v.abs())
                .collect();
            if finite.is_empty() {
                return f64::NAN;
            }
            match mode {
                Smoothing::Mean => finite.iter().sum::<f64>() / finite.len() as f64,
                Smoothing::Median | Smoothing::None => median_of(&mut finite),
            }
        })
        .collect()
}

/// One-sided running-maximum walk used by [`monotonic_envelope`].
///
/// `-inf` marks "no running value yet"; non-finite inputs are replaced by
/// the current running value, or 0 when none has been established.
fn running_max_walk(values: impl Iterator<Item = f64>, out: &mut Vec<f64>) {
    let mut current = f64::NEG_INFINITY;
    for val in values {
        let mut v = if val.is_finite() { val } else { current };
        if !v.is_finite() {
            v = if current.is_finite() { current } else { 0.0 };
        }
        if !current.is_finite() || v > current {
            current = v;
        }
        out.push(current);
    }
}

/// Constrain a series to be monotonic around `ref_index`.
///
/// The low-frequency side (indices `0..=ref_index`) becomes non-decreasing
/// and the high-frequency side (`ref_index..`) non-increasing: each side is
/// a running maximum accumulated toward the reference point. The two halves
/// share the reference sample, which appears once in the output and takes
/// the larger of the two running maxima - when the reference is not the
/// series peak (possible with a frequency-targeted reference), the rising
/// side would otherwise dip at the junction.
pub fn monotonic_envelope(values: &[f64], ref_index: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let idx = ref_index.min(n - 1);

    let mut lo_env = Vec::with_capacity(idx + 1);
    running_max_walk(values[..=idx].iter().copied(), &mut lo_env);

    let mut hi_env_rev = Vec::with_capacity(n - idx);
    running_max_walk(values[idx..].iter().rev().copied(), &mut hi_env_rev);

    let lo_peak = lo_env.pop().unwrap_or(f64::NEG_INFINITY);
    if let Some(junction) = hi_env_rev.last_mut() {
        *junction = junction.max(lo_peak);
    }
    lo_env.extend(hi_env_rev.into_iter().rev());
    lo_env
}
