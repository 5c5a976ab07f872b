//! Sweep frequency point generation.

use std::str::FromStr;

/// Spacing scheme for sweep frequency points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointSpacing {
    /// Logarithmic spacing, the usual choice for audio response sweeps.
    #[default]
    Log,
    /// Linear spacing.
    Linear,
}

impl FromStr for PointSpacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "logarithmic" => Ok(Self::Log),
            "linear" | "lin" => Ok(Self::Linear),
            other => Err(format!("unknown point spacing '{other}'")),
        }
    }
}

/// Build the ordered sweep frequency points between `start_hz` and `stop_hz`.
///
/// Endpoints are always included exactly. `points` must be >= 2 and both
/// frequencies must be positive for log spacing; the caller (the sweep
/// driver) validates before calling, so out-of-range inputs here fall back
/// to linear interpolation rather than panicking.
pub fn build_freq_points(start_hz: f64, stop_hz: f64, points: usize, spacing: PointSpacing) -> Vec<f64> {
    if points == 0 {
        return Vec::new();
    }
    if points == 1 {
        return vec![start_hz];
    }

    let n = (points - 1) as f64;
    let use_log = spacing == PointSpacing::Log && start_hz > 0.0 && stop_hz > 0.0;

    let mut freqs: Vec<f64> = (0..points)
        .map(|i| {
            let t = i as f64 / n;
            if use_log {
                let lo = start_hz.log10();
                let hi = stop_hz.log10();
                10f64.powf(lo + t * (hi - lo))
            } else {
                start_hz + t * (stop_hz - start_hz)
            }
        })
        .collect();

    // Pin the endpoints so float round-off never shifts them.
    freqs[0] = start_hz;
    freqs[points - 1] = stop_hz;
    freqs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_points_hit_endpoints_exactly() {
        let f = build_freq_points(20.0, 20000.0, 61, PointSpacing::Log);
        assert_eq!(f.len(), 61);
        assert_eq!(f[0], 20.0);
        assert_eq!(f[60], 20000.0);
    }

    #[test]
    fn log_points_are_strictly_increasing() {
        let f = build_freq_points(20.0, 20000.0, 31, PointSpacing::Log);
        for pair in f.windows(2) {
            assert!(pair[1] > pair[0], "{} !> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn log_midpoint_is_geometric_mean() {
        let f = build_freq_points(100.0, 10000.0, 3, PointSpacing::Log);
        assert!((f[1] - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn linear_points_are_evenly_spaced() {
        let f = build_freq_points(0.0, 100.0, 5, PointSpacing::Linear);
        assert_eq!(f, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn descending_sweep_descends() {
        let f = build_freq_points(20000.0, 20.0, 11, PointSpacing::Log);
        for pair in f.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn spacing_parses() {
        assert_eq!("log".parse::<PointSpacing>().unwrap(), PointSpacing::Log);
        assert_eq!("LIN".parse::<PointSpacing>().unwrap(), PointSpacing::Linear);
        assert!("cubic".parse::<PointSpacing>().is_err());
    }
}
