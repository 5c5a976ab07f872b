//! Benchkit CLI - automated amplifier bench sweeps from the command line.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "benchkit")]
#[command(author, version, about = "Amplifier bench sweep runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep THD vs frequency and write a CSV
    Thd(commands::thd::ThdArgs),

    /// Sweep amplitude vs frequency and estimate the bandwidth knees
    Knee(commands::knee::KneeArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Thd(args) => commands::thd::run(args),
        Commands::Knee(args) => commands::knee::run(args),
    }
}
