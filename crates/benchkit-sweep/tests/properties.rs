//! Property-based tests for the sweep post-processing chain.
//!
//! Uses proptest to verify the cleanup stages hold their structural
//! invariants for arbitrary measurement series: the sanitizer is an
//! identity on clean data, the smoother preserves shape, the envelope is
//! monotonic around its reference, and the spike filter only ever touches
//! the THD column.

use benchkit_sweep::{
    Smoothing, SpikeFilterConfig, ThdPoint, filter_spikes, monotonic_envelope,
    sanitize_amplitudes, smooth_series,
};
use proptest::prelude::*;

/// Any f64 a real capture could plausibly produce, including junk.
fn messy_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        5 => 1e-6f64..1e3,
        2 => -1e3f64..-1e-6,
        1 => Just(0.0),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Positive finite input passes through the sanitizer unchanged.
    #[test]
    fn sanitizer_is_identity_on_clean_series(
        values in prop::collection::vec(1e-6f64..1e3, 0..64),
    ) {
        prop_assert_eq!(sanitize_amplitudes(&values), values);
    }

    /// The sanitizer always yields finite positive output of the same
    /// length, whatever junk comes in.
    #[test]
    fn sanitizer_output_is_always_usable(
        values in prop::collection::vec(messy_value(), 0..64),
    ) {
        let cleaned = sanitize_amplitudes(&values);
        prop_assert_eq!(cleaned.len(), values.len());
        for v in cleaned {
            prop_assert!(v.is_finite() && v > 0.0, "unusable amplitude {}", v);
        }
    }

    /// A window of one point smooths nothing.
    #[test]
    fn smoother_window_one_is_identity(
        values in prop::collection::vec(1e-6f64..1e3, 0..64),
        mode in prop_oneof![Just(Smoothing::Median), Just(Smoothing::Mean)],
    ) {
        prop_assert_eq!(smooth_series(&values, 1, mode), values);
    }

    /// The smoother never changes the series length.
    #[test]
    fn smoother_preserves_length(
        values in prop::collection::vec(messy_value(), 0..64),
        window in 0usize..12,
        mode in prop_oneof![Just(Smoothing::Median), Just(Smoothing::Mean), Just(Smoothing::None)],
    ) {
        prop_assert_eq!(smooth_series(&values, window, mode).len(), values.len());
    }

    /// The envelope is non-decreasing up to the reference index and
    /// non-increasing after it.
    #[test]
    fn envelope_is_monotonic_about_reference(
        values in prop::collection::vec(messy_value(), 1..64),
        ref_frac in 0.0f64..1.0,
    ) {
        let ref_index = ((values.len() - 1) as f64 * ref_frac) as usize;
        let env = monotonic_envelope(&values, ref_index);
        prop_assert_eq!(env.len(), values.len());
        for i in 1..=ref_index {
            prop_assert!(env[i] >= env[i - 1], "rising side dips at {}", i);
        }
        for i in ref_index + 1..env.len() {
            prop_assert!(env[i] <= env[i - 1], "falling side climbs at {}", i);
        }
    }

    /// Spike suppression only ever rewrites the THD column; frequency,
    /// Vrms, and Vpp come back untouched, in order.
    #[test]
    fn spike_filter_preserves_voltages(
        thd in prop::collection::vec(messy_value(), 0..48),
    ) {
        let rows: Vec<ThdPoint> = thd
            .iter()
            .enumerate()
            .map(|(i, &t)| ThdPoint {
                freq_hz: 20.0 * (i as f64 + 1.0),
                vrms: 0.1 * (i as f64 + 1.0),
                vpp: 0.3 * (i as f64 + 1.0),
                thd_percent: t,
            })
            .collect();
        let (filtered, suppressions) = filter_spikes(&rows, &SpikeFilterConfig::default());
        prop_assert_eq!(filtered.len(), rows.len());
        for (before, after) in rows.iter().zip(&filtered) {
            prop_assert_eq!(before.freq_hz, after.freq_hz);
            prop_assert_eq!(before.vrms, after.vrms);
            prop_assert_eq!(before.vpp, after.vpp);
        }
        for s in &suppressions {
            prop_assert!(rows.iter().any(|r| r.freq_hz == s.freq_hz));
        }
    }
}
