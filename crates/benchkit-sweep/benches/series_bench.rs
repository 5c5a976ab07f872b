//! Criterion benchmarks for the sweep post-processing chain
//!
//! Run with: cargo bench -p benchkit-sweep

use benchkit_sweep::{
    Smoothing, SpikeFilterConfig, ThdPoint, filter_spikes, monotonic_envelope,
    sanitize_amplitudes, smooth_series,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Generate a noisy bandpass-shaped amplitude series.
fn generate_response(size: usize) -> Vec<f64> {
    let mut state = 0x12345678u32;
    (0..size)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = f64::from(state as i32) / f64::from(i32::MAX) * 0.05;
            let x = i as f64 / size as f64;
            // Skewed hump peaking in the low third of the sweep.
            (4.0 * x * (1.0 - x)).powf(0.7) + noise
        })
        .collect()
}

fn generate_thd_rows(size: usize) -> Vec<ThdPoint> {
    generate_response(size)
        .into_iter()
        .enumerate()
        .map(|(i, v)| ThdPoint {
            freq_hz: 20.0 * (i as f64 + 1.0),
            vrms: v / std::f64::consts::SQRT_2,
            vpp: 2.0 * v,
            thd_percent: 0.5 + v,
        })
        .collect()
}

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sanitize");

    for &size in &[61, 241, 961] {
        let mut series = generate_response(size);
        // Seed some junk so the replacement path gets exercised.
        for i in (0..size).step_by(17) {
            series[i] = f64::NAN;
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(sanitize_amplitudes(black_box(&series))))
        });
    }

    group.finish();
}

fn bench_smooth(c: &mut Criterion) {
    let mut group = c.benchmark_group("Smooth");

    let modes = [("Median", Smoothing::Median), ("Mean", Smoothing::Mean)];
    let series = generate_response(241);

    for (name, mode) in &modes {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(smooth_series(black_box(&series), 5, *mode)))
        });
    }

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("Envelope");

    for &size in &[61, 241, 961] {
        let series = generate_response(size);
        let ref_index = size / 3;

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(monotonic_envelope(black_box(&series), ref_index)))
        });
    }

    group.finish();
}

fn bench_spike_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("SpikeFilter");

    for &size in &[61, 241] {
        let mut rows = generate_thd_rows(size);
        for i in (3..size).step_by(13) {
            rows[i].thd_percent *= 20.0;
        }
        let config = SpikeFilterConfig::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(filter_spikes(black_box(&rows), &config)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sanitize,
    bench_smooth,
    bench_envelope,
    bench_spike_filter
);
criterion_main!(benches);
