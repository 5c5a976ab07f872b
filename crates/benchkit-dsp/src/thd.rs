//! Total Harmonic Distortion estimation via windowed FFT.
//!
//! Measures the ratio of harmonic energy to the fundamental for a captured
//! sine response with a known drive frequency. The harmonic amplitudes are
//! read from the magnitude spectrum with a small bin search around each
//! expected harmonic location, which tolerates generator/timebase frequency
//! error of a couple of bins.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Window function applied before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// No windowing.
    Rectangular,
    /// Hann window, the sweep default.
    #[default]
    Hann,
    /// Hamming window.
    Hamming,
    /// Blackman window, lowest leakage of the set.
    Blackman,
}

impl Window {
    /// Apply the window in place.
    pub fn apply(self, samples: &mut [f64]) {
        let n = samples.len();
        if n < 2 {
            return;
        }
        let m = (n - 1) as f64;
        for (i, s) in samples.iter_mut().enumerate() {
            let x = i as f64 / m;
            let w = match self {
                Window::Rectangular => 1.0,
                Window::Hann => 0.5 - 0.5 * (2.0 * PI * x).cos(),
                Window::Hamming => 0.54 - 0.46 * (2.0 * PI * x).cos(),
                Window::Blackman => {
                    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
                }
            };
            *s *= w;
        }
    }
}

/// Largest spectrum magnitude within +/-`span` bins of `center`.
fn peak_near(magnitudes: &[f64], center: usize, span: usize) -> f64 {
    let lo = center.saturating_sub(span);
    let hi = (center + span + 1).min(magnitudes.len());
    magnitudes[lo..hi].iter().copied().fold(0.0, f64::max)
}

/// Estimate THD as a ratio (0.0..) for a capture of `f0` Hz drive.
///
/// `times` supplies the sample spacing (assumed uniform); `nharm` caps how
/// many harmonics are summed, counting the fundamental as the first.
/// Harmonics at or beyond Nyquist are ignored.
///
/// Returns `None` when the capture is too short, the timebase is
/// degenerate, or the fundamental cannot be resolved.
pub fn thd_fft(times: &[f64], volts: &[f64], f0: f64, nharm: usize, window: Window) -> Option<f64> {
    let n = volts.len().min(times.len());
    if n < 16 || !f0.is_finite() || f0 <= 0.0 || nharm < 2 {
        return None;
    }
    let dt = (times[n - 1] - times[0]) / (n - 1) as f64;
    if !dt.is_finite() || dt <= 0.0 {
        return None;
    }
    let sample_rate = 1.0 / dt;
    let nyquist = sample_rate / 2.0;
    if f0 >= nyquist {
        return None;
    }

    let mut windowed: Vec<f64> = volts[..n].to_vec();
    window.apply(&mut windowed);

    let mut buf: Vec<Complex<f64>> = windowed.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buf);

    let half = n / 2;
    let magnitudes: Vec<f64> = buf[..half].iter().map(|c| c.norm()).collect();
    let bin_width = sample_rate / n as f64;

    let mut harmonics: Vec<f64> = Vec::with_capacity(nharm);
    for h in 1..=nharm {
        let freq = f0 * h as f64;
        if freq >= nyquist {
            break;
        }
        let center = (freq / bin_width).round() as usize;
        if center >= half {
            break;
        }
        harmonics.push(peak_near(&magnitudes, center, 2));
    }

    let fundamental = *harmonics.first()?;
    if fundamental <= 0.0 {
        return None;
    }
    let harmonic_power: f64 = harmonics[1..].iter().map(|a| a * a).sum();
    Some(harmonic_power.sqrt() / fundamental)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Capture of `f0` with a relative 2nd harmonic, `n` samples at `fs`.
    fn two_tone(f0: f64, h2: f64, fs: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let times: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let volts: Vec<f64> = times
            .iter()
            .map(|&t| (2.0 * PI * f0 * t).sin() + h2 * (2.0 * PI * 2.0 * f0 * t).sin())
            .collect();
        (times, volts)
    }

    #[test]
    fn pure_sine_measures_near_zero_thd() {
        let (t, v) = two_tone(1000.0, 0.0, 48000.0, 8192);
        let thd = thd_fft(&t, &v, 1000.0, 10, Window::Hann).unwrap();
        assert!(thd < 0.005, "THD {thd} should be near zero");
    }

    #[test]
    fn ten_percent_second_harmonic_reads_ten_percent() {
        let (t, v) = two_tone(1000.0, 0.1, 48000.0, 8192);
        let thd = thd_fft(&t, &v, 1000.0, 10, Window::Hann).unwrap();
        assert!((thd - 0.1).abs() < 0.01, "THD {thd} should be ~0.1");
    }

    #[test]
    fn short_or_bad_captures_yield_none() {
        assert!(thd_fft(&[0.0, 1.0], &[0.0, 1.0], 1000.0, 10, Window::Hann).is_none());
        let (t, v) = two_tone(1000.0, 0.0, 48000.0, 4096);
        assert!(thd_fft(&t, &v, f64::NAN, 10, Window::Hann).is_none());
        assert!(thd_fft(&t, &v, 30000.0, 10, Window::Hann).is_none());
    }

    #[test]
    fn window_preserves_length_and_tapers_edges() {
        let mut v = vec![1.0; 64];
        Window::Hann.apply(&mut v);
        assert_eq!(v.len(), 64);
        assert!(v[0].abs() < 1e-12);
        assert!((v[32] - 1.0).abs() < 0.01);
    }
}
