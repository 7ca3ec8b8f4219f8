//! Inspect command - print the header of a save-state file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use timeslice_core::state::{FORMAT_TAG, HeaderInfo, inspect};

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Save-state file (.st0 - .st9)
    pub file: PathBuf,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let info = inspect(&bytes)
        .with_context(|| format!("{} is not a save state", args.file.display()))?;

    println!("=== Save State ===");
    println!("  File: {}", args.file.display());
    print!("{}", describe(&info));
    Ok(())
}

fn describe(info: &HeaderInfo) -> String {
    let compatibility = if info.is_compatible() {
        "compatible".to_string()
    } else {
        format!("incompatible, expected {FORMAT_TAG}")
    };
    format!(
        "  Format: {} ({compatibility})\n  Cartridge type: {}\n  Machine state: {} bytes\n",
        info.format_tag, info.cartridge_kind, info.payload_len
    )
}
