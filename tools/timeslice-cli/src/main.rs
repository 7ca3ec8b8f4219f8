//! Timeslice CLI - drive the scheduler headless and inspect save states
//!
//! # Commands
//!
//! - `timeslice run` - Run the demo machine in real time for a number of frames
//! - `timeslice inspect` - Print the header of a save-state file
//! - `timeslice slots` - List the save slots of a cartridge
//!
//! # Usage
//!
//! ```bash
//! # Run 300 frames, then rewind 60 and save to slot 2
//! timeslice run --frames 300 --rewind 60 --save 2
//!
//! # Check whether a state file can be loaded
//! timeslice inspect "state/Demo Cart.st2"
//! ```

mod inspect;
mod run;
mod slots;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use timeslice_core::Settings;

/// Timeslice CLI - real-time emulation with Time Machine history
#[derive(Parser)]
#[command(name = "timeslice")]
#[command(about = "Real-time emulation scheduler with Time Machine history")]
#[command(version)]
struct Cli {
    /// Config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo machine in real time
    Run(run::RunArgs),

    /// Print the header of a save-state file
    Inspect(inspect::InspectArgs),

    /// List the save slots of a cartridge
    Slots(slots::SlotsArgs),
}

/// Load settings from `--config` or the platform default location
fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(path) => Some(path),
        None => timeslice_core::config::default_config_path(),
    };
    match path {
        Some(path) => Settings::load(path.clone())
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            tracing::warn!("No config directory available, using defaults");
            Ok(Settings::default())
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(args, load_settings(cli.config)?),
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Slots(args) => slots::execute(args, load_settings(cli.config)?),
    }
}
