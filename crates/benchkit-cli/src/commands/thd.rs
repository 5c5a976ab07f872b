//! `benchkit thd` - THD vs frequency sweep.

use super::common::{BenchArgs, SweepArgs};
use benchkit_sweep::{ThdSweepConfig, format_thd_rows, thd_sweep};
use clap::Args;

#[derive(Args)]
pub struct ThdArgs {
    #[command(flatten)]
    bench: BenchArgs,

    #[command(flatten)]
    sweep: SweepArgs,

    /// Idle tone frequency restored after the sweep, Hz
    #[arg(long, default_value = "1000")]
    post_freq: f64,

    /// Idle timebase restored after the sweep, seconds/div
    #[arg(long, default_value = "0.0001")]
    post_timebase: f64,

    /// Disable THD spike suppression
    #[arg(long)]
    no_spike_filter: bool,
}

pub fn run(args: ThdArgs) -> anyhow::Result<()> {
    let calibration = args.sweep.calibration()?;

    let mut config = ThdSweepConfig {
        amp_vpp: args.sweep.amp,
        calibrate_to_vpp: args.sweep.calibrate_to,
        start_hz: args.sweep.start,
        stop_hz: args.sweep.stop,
        points: args.sweep.points,
        dwell_s: args.sweep.dwell,
        source: args.sweep.source,
        math_order: args.sweep.math_order,
        drive_channel: args.sweep.channel,
        output: args.sweep.output.clone(),
        post_freq_hz: args.post_freq,
        post_seconds_per_div: Some(args.post_timebase),
        auto_scale: args.sweep.auto_scale(),
        ..ThdSweepConfig::default()
    };
    if args.no_spike_filter {
        config.spike_filter = None;
    }

    let mut bench = args.bench.open()?;
    let outcome = thd_sweep(&mut bench, &config, calibration.as_ref())?;

    for line in format_thd_rows(&outcome.rows) {
        println!("{line}");
    }
    for s in &outcome.suppressions {
        println!(
            "suppressed spike at {:.2} Hz: {:.3}% -> {:.3}%",
            s.freq_hz, s.original_thd_percent, s.replacement_thd_percent
        );
    }
    if let Some(path) = &outcome.csv_path {
        println!("wrote {}", path.display());
    }

    Ok(())
}
