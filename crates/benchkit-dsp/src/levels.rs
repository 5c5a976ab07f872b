//! Level measurement on captured waveforms.
//!
//! Voltage counterparts of the usual audio dynamics measures: RMS level and
//! peak-to-peak swing, plus the dB conversion used for relative-response
//! columns.

/// Compute the RMS (Root Mean Square) voltage of a captured trace.
///
/// Returns NaN for an empty trace so a failed capture stays visibly invalid
/// instead of reading as silence.
pub fn vrms(volts: &[f64]) -> f64 {
    if volts.is_empty() {
        return f64::NAN;
    }

    let sum_sq: f64 = volts.iter().map(|&v| v * v).sum();
    (sum_sq / volts.len() as f64).sqrt()
}

/// Compute the peak-to-peak voltage of a captured trace.
///
/// Returns NaN for an empty trace or when any sample is non-finite.
pub fn vpp(volts: &[f64]) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in volts {
        if !v.is_finite() {
            return f64::NAN;
        }
        min = min.min(v);
        max = max.max(v);
    }
    if volts.is_empty() { f64::NAN } else { max - min }
}

/// Convert a linear amplitude to dB (`20 * log10`).
///
/// Non-positive or non-finite amplitudes map to `-inf`.
pub fn db_from_amplitude(amplitude: f64) -> f64 {
    if amplitude.is_finite() && amplitude > 0.0 {
        20.0 * amplitude.log10()
    } else {
        f64::NEG_INFINITY
    }
}
