mod analysis;
mod config;
mod dispersal;
mod engine;
mod error;
mod forcing;
mod kernels;
mod manager;
mod model;
mod params;
mod solver;
mod stats;
mod sweep;
mod trajectory;
mod utils;

use crate::manager::Manager;
use crate::model::Preset;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Integrate the model once under the configured management.
    Run {
        #[arg(long, value_enum, default_value_t = PresetArg::High)]
        preset: PresetArg,

        /// Include the whole trajectory in the output.
        #[arg(long)]
        full: bool,
    },

    /// Time for coral to recover from the low preset without fishing.
    Recovery,

    /// Bisect for the unstable coral equilibrium.
    Equilibrium,

    /// Sweep rotation periods and closed fractions against static closures.
    Sweep,

    /// Final coral from both presets over a range of fishing intensities.
    Bistable,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    Low,
    High,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Low => Preset::Low,
            PresetArg::High => Preset::High,
        }
    }
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run { preset, full } => mgr.run_model(preset.into(), full)?,
        Command::Recovery => mgr.recovery_time()?,
        Command::Equilibrium => mgr.unstable_equilibrium()?,
        Command::Sweep => mgr.run_sweep()?,
        Command::Bistable => mgr.bistable_zone()?,
    }

    Ok(())
}
