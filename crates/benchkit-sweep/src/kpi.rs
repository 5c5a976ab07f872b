//! Per-point measurement loop shared by the sweep drivers.
//!
//! For each frequency: apply the generator setting, optionally pre-position
//! the scope vertical scale, dwell, arm a single-sequence acquisition,
//! capture, and reduce the trace to Vrms/Vpp (and THD when requested). Knee
//! detection runs once over the collected amplitude series after the loop.
//!
//! Measurement-path instrument failures propagate immediately - the loop
//! makes no attempt to roll back generator or scope state. Only the final
//! vertical-scale restore is best-effort.

use crate::best_effort;
use benchkit_dsp::{KneeResult, Window, thd_fft, vpp, vrms};
use benchkit_instrument::{
    Bench, GeneratorSetting, MathOrder, Oscilloscope, SignalGenerator, TraceSource,
};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// One raw measurement row, before calibration correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiRow {
    /// Stimulus frequency in Hz.
    pub freq_hz: f64,
    /// Measured RMS voltage.
    pub vrms: f64,
    /// Measured peak-to-peak voltage.
    pub vpp: f64,
    /// THD as a ratio (NaN when not measured).
    pub thd_ratio: f64,
    /// THD in percent (NaN when not measured).
    pub thd_percent: f64,
}

/// Vertical auto-scale settings: per-source relative gains plus the scaling
/// rule `volts_per_div = max(floor, drive_vpp * gain * margin / divisions)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoScale {
    /// Raw `(source label, expected gain)` entries as supplied by the user.
    /// Labels are parsed once at sweep start; invalid entries are logged
    /// and dropped.
    pub gains: Vec<(String, f64)>,
    /// Headroom factor above the expected signal swing.
    pub margin: f64,
    /// Smallest volts/div ever commanded.
    pub min_volts_per_div: f64,
    /// Vertical divisions on the scope graticule.
    pub divisions: f64,
}

impl Default for AutoScale {
    fn default() -> Self {
        Self {
            gains: Vec::new(),
            margin: 1.25,
            min_volts_per_div: 1e-3,
            divisions: 8.0,
        }
    }
}

impl AutoScale {
    /// Parse the raw gain entries into typed sources, dropping (and logging)
    /// anything unusable.
    pub(crate) fn plan(&self) -> Vec<(TraceSource, f64)> {
        let mut plan = Vec::with_capacity(self.gains.len());
        for (label, gain) in &self.gains {
            let Ok(source) = TraceSource::from_str(label) else {
                tracing::warn!("invalid scope scale source '{label}', entry dropped");
                continue;
            };
            if !gain.is_finite() || *gain <= 0.0 {
                tracing::warn!(%source, gain, "invalid scope scale gain, entry dropped");
                continue;
            }
            plan.push((source, *gain));
        }
        plan
    }
}

/// What to compute per point beyond Vrms/Vpp.
pub(crate) enum KpiAnalysis<'a> {
    /// THD against the stimulus fundamental.
    Thd {
        /// Harmonics summed, fundamental included.
        nharm: usize,
    },
    /// Bandwidth knees over the whole Vpp series, after the loop.
    Knees {
        detector: &'a dyn Fn(&[f64], &[f64]) -> Option<KneeResult>,
    },
}

/// Configuration of one measurement loop run.
pub(crate) struct KpiSweep<'a> {
    pub freqs: &'a [f64],
    /// Drive amplitude when no per-frequency strategy applies.
    pub amp_vpp: f64,
    /// Per-frequency drive amplitude (calibrated-target sweeps).
    pub amp_for: Option<&'a dyn Fn(f64) -> f64>,
    pub drive_channel: u8,
    pub dwell_s: f64,
    pub source: TraceSource,
    pub math_order: MathOrder,
    pub auto_scale: Option<&'a AutoScale>,
    pub capture_timeout: Duration,
    pub single_timeout: Duration,
    pub analysis: KpiAnalysis<'a>,
}

pub(crate) struct KpiOutcome {
    pub rows: Vec<KpiRow>,
    pub knees: Option<KneeResult>,
}

impl KpiSweep<'_> {
    pub(crate) fn run<G, S>(&self, bench: &mut Bench<G, S>) -> crate::Result<KpiOutcome>
    where
        G: SignalGenerator,
        S: Oscilloscope,
    {
        if self.source == TraceSource::Math {
            bench.scope.configure_math_subtract(self.math_order)?;
        }

        let scale_plan = self.auto_scale.map(|a| a.plan()).unwrap_or_default();
        let mut original_scales = Vec::with_capacity(scale_plan.len());
        for (source, _) in &scale_plan {
            if let Some(volts_per_div) = bench.scope.read_vertical_scale(*source)? {
                original_scales.push((*source, volts_per_div));
            }
        }

        let mut rows = Vec::with_capacity(self.freqs.len());
        for &freq_hz in self.freqs {
            let amp_vpp = self.amp_for.map_or(self.amp_vpp, |f| f(freq_hz));

            let mut setting = GeneratorSetting::sine(freq_hz, amp_vpp);
            setting.channel = self.drive_channel;
            bench.generator.apply(&setting)?;

            if let Some(auto) = self.auto_scale {
                for &(source, gain) in &scale_plan {
                    let target = (amp_vpp * gain * auto.margin / auto.divisions)
                        .max(auto.min_volts_per_div);
                    bench.scope.set_vertical_scale(source, target)?;
                }
            }

            if self.dwell_s > 0.0 {
                thread::sleep(Duration::from_secs_f64(self.dwell_s));
            }

            bench.scope.arm_single()?;
            if !bench.scope.wait_single_complete(self.single_timeout)? {
                tracing::debug!(freq_hz, "single acquisition did not report complete");
            }
            let capture = bench.scope.capture_calibrated(self.source, self.capture_timeout)?;

            let vr = vrms(&capture.volts);
            let pk = vpp(&capture.volts);
            let thd_ratio = match self.analysis {
                KpiAnalysis::Thd { nharm } => {
                    thd_fft(&capture.times, &capture.volts, freq_hz, nharm, Window::Hann)
                        .unwrap_or(f64::NAN)
                }
                KpiAnalysis::Knees { .. } => f64::NAN,
            };

            tracing::debug!(freq_hz, vrms = vr, vpp = pk, thd_ratio, "sweep point");
            rows.push(KpiRow {
                freq_hz,
                vrms: vr,
                vpp: pk,
                thd_ratio,
                thd_percent: thd_ratio * 100.0,
            });
        }

        for (source, volts_per_div) in original_scales {
            best_effort(
                &format!("restoring {source} vertical scale to {volts_per_div} V/div"),
                bench.scope.set_vertical_scale(source, volts_per_div),
            );
        }

        let knees = match self.analysis {
            KpiAnalysis::Knees { detector } => {
                let amps: Vec<f64> = rows.iter().map(|r| r.vpp).collect();
                detector(self.freqs, &amps)
            }
            KpiAnalysis::Thd { .. } => None,
        };

        Ok(KpiOutcome { rows, knees })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_scale_plan_drops_invalid_entries() {
        let auto = AutoScale {
            gains: vec![
                ("CH1".to_string(), 10.0),
                ("1".to_string(), 2.0),
                ("math".to_string(), 1.0),
                ("REF1".to_string(), 3.0),
                ("CH2".to_string(), f64::NAN),
            ],
            ..AutoScale::default()
        };
        let plan = auto.plan();
        assert_eq!(
            plan,
            vec![
                (TraceSource::Channel(1), 10.0),
                (TraceSource::Channel(1), 2.0),
                (TraceSource::Math, 1.0),
            ]
        );
    }

    #[test]
    fn auto_scale_defaults_match_bench_conventions() {
        let auto = AutoScale::default();
        assert_eq!(auto.margin, 1.25);
        assert_eq!(auto.min_volts_per_div, 1e-3);
        assert_eq!(auto.divisions, 8.0);
    }
}
