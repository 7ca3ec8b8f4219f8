//! Slots command - list the save slots of a cartridge

use anyhow::Result;
use clap::Args;
use timeslice_core::state::inspect;
use timeslice_core::{CartridgeIdentity, Settings, Slot};

/// Arguments for the slots command
#[derive(Args)]
pub struct SlotsArgs {
    /// Cartridge name, as used for state file names
    #[arg(long, default_value = "Demo Cart")]
    pub name: String,

    /// Bank-switching type the states must match
    #[arg(long, default_value = "F8")]
    pub kind: String,
}

/// Execute the slots command
pub fn execute(args: SlotsArgs, settings: Settings) -> Result<()> {
    let cartridge = CartridgeIdentity::new(args.name, args.kind);
    let state_dir = settings.state_dir();

    println!("=== Save Slots: {cartridge} ===");
    println!("  Directory: {}", state_dir.display());

    for slot in Slot::all() {
        let path = slot.path(&state_dir, &cartridge);
        let status = match std::fs::read(&path) {
            Err(_) => "empty".to_string(),
            Ok(bytes) => match inspect(&bytes) {
                Err(_) => "unreadable".to_string(),
                Ok(info) if !info.is_compatible() => format!("incompatible ({})", info.format_tag),
                Ok(info) if info.cartridge_kind != cartridge.kind() => {
                    format!("other cartridge type ({})", info.cartridge_kind)
                }
                Ok(info) => format!("{} bytes", info.payload_len),
            },
        };
        println!("  {slot}: {status}");
    }
    Ok(())
}
