//! `benchkit knee` - bandwidth knee sweep.

use super::common::{BenchArgs, SweepArgs};
use benchkit_dsp::RefMode;
use benchkit_sweep::{KneeSweepConfig, Smoothing, knee_sweep};
use clap::Args;

#[derive(Args)]
pub struct KneeArgs {
    #[command(flatten)]
    bench: BenchArgs,

    #[command(flatten)]
    sweep: SweepArgs,

    /// Drop below the reference level that defines a knee, dB
    #[arg(long, default_value = "3")]
    drop_db: f64,

    /// Reference mode: max, or freq (nearest to --ref-hz)
    #[arg(long, default_value = "max")]
    ref_mode: RefMode,

    /// Reference frequency for --ref-mode freq, Hz
    #[arg(long, default_value = "1000")]
    ref_hz: f64,

    /// Amplitude smoothing before detection: median, mean, or none
    #[arg(long, default_value = "median")]
    smoothing: Smoothing,

    /// Smoother window in points
    #[arg(long, default_value = "5")]
    smooth_window: usize,

    /// Skip the monotonic envelope before detection
    #[arg(long)]
    no_monotonic: bool,
}

pub fn run(args: KneeArgs) -> anyhow::Result<()> {
    let calibration = args.sweep.calibration()?;

    let config = KneeSweepConfig {
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
        knee_drop_db: args.drop_db,
        ref_mode: args.ref_mode,
        ref_hz: args.ref_hz,
        smoothing: args.smoothing,
        smooth_window: args.smooth_window,
        enforce_monotonic: !args.no_monotonic,
        auto_scale: args.sweep.auto_scale(),
        ..KneeSweepConfig::default()
    };

    let mut bench = args.bench.open()?;
    let outcome = knee_sweep(&mut bench, &config, calibration.as_ref())?;

    match &outcome.knees {
        Some(knees) => {
            println!(
                "reference {:.4} Vpp ({:.2} dB), target {:.2} dB",
                knees.ref_amp, knees.ref_db, outcome.target_db
            );
            println!("f_lo {:.2} Hz, f_hi {:.2} Hz", knees.f_lo, knees.f_hi);
        }
        None => println!("no knees detected"),
    }
    if let Some(path) = &outcome.csv_path {
        println!("wrote {}", path.display());
    }

    Ok(())
}
