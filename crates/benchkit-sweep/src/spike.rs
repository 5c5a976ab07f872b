//! Local-median THD spike suppression.
//!
//! A THD sweep occasionally produces a single wildly-high reading - a
//! mistriggered capture, a mains burst, a clipped trace. Those outliers sit
//! far above their neighbors while genuine distortion trends move slowly
//! with frequency, so a local median baseline separates the two reliably.

/// One processed THD sweep point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThdPoint {
    /// Stimulus frequency in Hz.
    pub freq_hz: f64,
    /// Measured RMS voltage.
    pub vrms: f64,
    /// Measured peak-to-peak voltage.
    pub vpp: f64,
    /// THD in percent.
    pub thd_percent: f64,
}

/// Record of one spike replaced by the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suppression {
    /// Frequency of the suppressed point.
    pub freq_hz: f64,
    /// The THD reading as measured.
    pub original_thd_percent: f64,
    /// The local-median baseline it was replaced with.
    pub replacement_thd_percent: f64,
}

/// Spike filter tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeFilterConfig {
    /// Neighbors considered on each side of a point.
    pub window: usize,
    /// A reading is a spike when it exceeds `baseline * factor`.
    pub factor: f64,
    /// Absolute floor (percent) below which nothing is ever suppressed.
    pub min_percent: f64,
}

impl Default for SpikeFilterConfig {
    fn default() -> Self {
        Self {
            window: 2,
            factor: 2.0,
            min_percent: 2.0,
        }
    }
}

/// Replace outlier THD readings with their local median baseline.
///
/// For each row the baseline is the median of the finite THD values among
/// the `window` neighbors on each side, excluding the row itself. Rows with
/// no finite neighbors, or whose own THD is non-finite, pass through
/// unchanged. A reading strictly above `max(min_percent, baseline * factor)`
/// is replaced by the baseline and recorded. Vrms/Vpp are never touched.
pub fn filter_spikes(
    rows: &[ThdPoint],
    config: &SpikeFilterConfig,
) -> (Vec<ThdPoint>, Vec<Suppression>) {
    let mut filtered = Vec::with_capacity(rows.len());
    let mut suppressed = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let lo = idx.saturating_sub(config.window);
        let hi = (idx + config.window + 1).min(rows.len());
        let neighbors: Vec<f64> = (lo..hi)
            .filter(|&j| j != idx && rows[j].thd_percent.is_finite())
            .map(|j| rows[j].thd_percent)
            .collect();

        if neighbors.is_empty() || !row.thd_percent.is_finite() {
            filtered.push(*row);
            continue;
        }

        let baseline = median(&neighbors);
        let threshold = config.min_percent.max(baseline * config.factor);
        if row.thd_percent > threshold {
            suppressed.push(Suppression {
                freq_hz: row.freq_hz,
                original_thd_percent: row.thd_percent,
                replacement_thd_percent: baseline,
            });
            filtered.push(ThdPoint {
                thd_percent: baseline,
                ..*row
            });
        } else {
            filtered.push(*row);
        }
    }

    (filtered, suppressed)
}

/// Median of a non-empty slice of finite values.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
