//! -dB bandwidth knee detection.
//!
//! Given an amplitude-vs-frequency response and a reference level, finds the
//! two frequencies where the response crosses `ref_db - drop_db`. Crossings
//! are interpolated in (log10 frequency, dB) space between the bracketing
//! sweep points; a side that never drops below the target reports the sweep
//! edge on that side.

use std::str::FromStr;

/// How the 0 dB reference point of a response is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefMode {
    /// Use the largest amplitude in the series.
    #[default]
    Max,
    /// Use the point nearest a target frequency.
    Freq,
}

impl FromStr for RefMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.trim().to_ascii_lowercase();
        if mode == "max" {
            Ok(Self::Max)
        } else if mode.starts_with("freq") {
            Ok(Self::Freq)
        } else {
            Err(format!("unknown reference mode '{s}'"))
        }
    }
}

/// Detected bandwidth knees plus the reference they are relative to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KneeResult {
    /// Low-side crossing frequency (Hz).
    pub f_lo: f64,
    /// High-side crossing frequency (Hz).
    pub f_hi: f64,
    /// Reference amplitude (linear).
    pub ref_amp: f64,
    /// Reference level in dB (`20*log10(ref_amp)`).
    pub ref_db: f64,
}

/// Index of the reference point for knee detection.
///
/// Only finite, strictly positive amplitudes are eligible; with none, index
/// 0 is returned. `RefMode::Max` picks the first occurrence of the largest
/// eligible amplitude; `RefMode::Freq` picks the eligible point nearest
/// `ref_hz` (first occurrence on ties).
pub fn reference_index(freqs: &[f64], amps: &[f64], ref_mode: RefMode, ref_hz: f64) -> usize {
    let n = freqs.len().min(amps.len());
    let mut best: Option<usize> = None;
    for i in 0..n {
        if !(amps[i].is_finite() && amps[i] > 0.0) {
            continue;
        }
        best = match (ref_mode, best) {
            (_, None) => Some(i),
            (RefMode::Max, Some(b)) => {
                if amps[i] > amps[b] {
                    Some(i)
                } else {
                    Some(b)
                }
            }
            (RefMode::Freq, Some(b)) => {
                if (freqs[i] - ref_hz).abs() < (freqs[b] - ref_hz).abs() {
                    Some(i)
                } else {
                    Some(b)
                }
            }
        };
    }
    best.unwrap_or(0)
}

fn amp_db(amp: f64) -> f64 {
    if amp.is_finite() && amp > 0.0 {
        20.0 * amp.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Interpolated crossing frequency between points `inside` (above target)
/// and `outside` (below target), in log-frequency / dB space.
fn cross_freq(freqs: &[f64], db: &[f64], inside: usize, outside: usize, target: f64) -> f64 {
    let (f_in, f_out) = (freqs[inside], freqs[outside]);
    let (db_in, db_out) = (db[inside], db[outside]);
    if !db_out.is_finite() || (db_in - db_out).abs() < f64::EPSILON {
        return f_out;
    }
    let t = (db_in - target) / (db_in - db_out);
    let log_f = f_in.log10() + t * (f_out.log10() - f_in.log10());
    10f64.powf(log_f)
}

/// Find the -`drop_db` bandwidth knees of an amplitude response.
///
/// Returns `None` when no eligible (finite, positive) amplitude exists.
pub fn find_knees(
    freqs: &[f64],
    amps: &[f64],
    ref_mode: RefMode,
    ref_hz: f64,
    drop_db: f64,
) -> Option<KneeResult> {
    let n = freqs.len().min(amps.len());
    if n == 0 || !amps.iter().take(n).any(|a| a.is_finite() && *a > 0.0) {
        return None;
    }

    let ref_idx = reference_index(&freqs[..n], &amps[..n], ref_mode, ref_hz);
    let ref_amp = amps[ref_idx];
    let ref_db = amp_db(ref_amp);
    if !ref_db.is_finite() {
        return None;
    }
    let target = ref_db - drop_db;
    let db: Vec<f64> = amps[..n].iter().map(|&a| amp_db(a)).collect();

    // Walk outward from the reference; the first point at/below target on
    // each side brackets the crossing.
    let mut f_lo = freqs[0];
    for i in (0..ref_idx).rev() {
        if db[i] <= target {
            f_lo = cross_freq(freqs, &db, i + 1, i, target);
            break;
        }
    }

    let mut f_hi = freqs[n - 1];
    for i in (ref_idx + 1)..n {
        if db[i] <= target {
            f_hi = cross_freq(freqs, &db, i - 1, i, target);
            break;
        }
    }

    Some(KneeResult {
        f_lo,
        f_hi,
        ref_amp,
        ref_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_max_wins_ties() {
        assert_eq!(
            reference_index(&[100.0, 200.0, 300.0], &[1.0, 2.0, 2.0], RefMode::Max, 0.0),
            1
        );
    }

    #[test]
    fn freq_mode_picks_nearest_eligible() {
        let freqs = [100.0, 1000.0, 10000.0];
        let amps = [1.0, f64::NAN, 0.5];
        assert_eq!(reference_index(&freqs, &amps, RefMode::Freq, 900.0), 0);
        assert_eq!(reference_index(&freqs, &amps, RefMode::Freq, 9000.0), 2);
    }

    #[test]
    fn no_eligible_amplitude_returns_zero() {
        assert_eq!(
            reference_index(&[1.0, 2.0], &[f64::NAN, -1.0], RefMode::Max, 0.0),
            0
        );
    }

    #[test]
    fn knees_bracket_a_symmetric_response() {
        // -6 dB per octave-ish skirts around a 1 kHz peak.
        let freqs = [125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0];
        let amps = [0.125, 0.25, 0.5, 1.0, 0.5, 0.25, 0.125];
        let k = find_knees(&freqs, &amps, RefMode::Max, 1000.0, 3.0).unwrap();
        assert_eq!(k.ref_amp, 1.0);
        assert!(k.ref_db.abs() < 1e-12);
        assert!(k.f_lo > 500.0 && k.f_lo < 1000.0, "f_lo = {}", k.f_lo);
        assert!(k.f_hi > 1000.0 && k.f_hi < 2000.0, "f_hi = {}", k.f_hi);
    }

    #[test]
    fn flat_response_reports_sweep_edges() {
        let freqs = [20.0, 200.0, 2000.0, 20000.0];
        let amps = [1.0, 1.0, 1.0, 1.0];
        let k = find_knees(&freqs, &amps, RefMode::Max, 1000.0, 3.0).unwrap();
        assert_eq!(k.f_lo, 20.0);
        assert_eq!(k.f_hi, 20000.0);
    }

    #[test]
    fn exact_crossing_lands_on_the_point() {
        // -3.0 dB is amplitude 10^(-3/20); put that exactly at 100 Hz.
        let drop = 10f64.powf(-3.0 / 20.0);
        let freqs = [100.0, 1000.0, 10000.0];
        let amps = [drop, 1.0, drop];
        let k = find_knees(&freqs, &amps, RefMode::Max, 1000.0, 3.0).unwrap();
        assert!((k.f_lo - 100.0).abs() < 1e-6);
        assert!((k.f_hi - 10000.0).abs() < 1e-3);
    }

    #[test]
    fn all_invalid_amplitudes_yield_none() {
        assert!(find_knees(&[1.0, 2.0], &[f64::NAN, 0.0], RefMode::Max, 0.0, 3.0).is_none());
        assert!(find_knees(&[], &[], RefMode::Max, 0.0, 3.0).is_none());
    }

    #[test]
    fn ref_mode_parses() {
        assert_eq!("max".parse::<RefMode>().unwrap(), RefMode::Max);
        assert_eq!("freq".parse::<RefMode>().unwrap(), RefMode::Freq);
        assert_eq!("frequency".parse::<RefMode>().unwrap(), RefMode::Freq);
        assert!("peak".parse::<RefMode>().is_err());
    }
}
