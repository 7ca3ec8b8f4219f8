//! Run command - emulate the demo machine headless at real-time pace
//!
//! Frames are counted but not displayed. When the frame budget is spent the
//! optional rewind and save are issued as ordinary scheduler commands, so
//! they go through the same paths a windowed frontend would use.

use anyhow::{Result, bail};
use clap::Args;
use timeslice_core::debugger::RecordingDebugger;
use timeslice_core::{
    AppState, CartridgeIdentity, Command, Commands, Debugger, DemoMachine, FrameBuffer,
    FrameLayout, Frontend, Machine, Scheduler, Settings, Slot, StateManager, SystemClock,
};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Rendered frames to run before stopping
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Use the PAL frame layout instead of NTSC
    #[arg(long)]
    pub pal: bool,

    /// Seed of the demo program
    #[arg(long, default_value_t = 0x2600)]
    pub seed: u32,

    /// Cartridge name, used for state file names
    #[arg(long, default_value = "Demo Cart")]
    pub name: String,

    /// Stop in the debugger when execution reaches this address (hex)
    #[arg(long, value_parser = parse_address)]
    pub breakpoint: Option<u16>,

    /// Load this slot before running
    #[arg(long)]
    pub load: Option<u8>,

    /// Rewind this many Time Machine states at the end
    #[arg(long)]
    pub rewind: Option<usize>,

    /// Save to this slot at the end
    #[arg(long)]
    pub save: Option<u8>,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches('$').trim_start_matches("0x");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn parse_slot(slot: Option<u8>) -> Result<Option<Slot>> {
    match slot {
        None => Ok(None),
        Some(n) => match Slot::new(n) {
            Some(slot) => Ok(Some(slot)),
            None => bail!("slot must be 0-9, got {n}"),
        },
    }
}

/// Frontend without a window: counts frames and prints messages
struct HeadlessFrontend {
    frames_left: u64,
    /// Issued once the frame budget is spent
    finale: Option<Commands>,
    rendered: u64,
    last_fps: f32,
    debugger: RecordingDebugger,
}

impl Frontend for HeadlessFrontend {
    fn poll(&mut self, state: AppState) -> Commands {
        if state == AppState::Emulation && self.frames_left > 0 {
            return Commands::new();
        }
        let mut commands = self.finale.take().unwrap_or_default();
        commands.push(Command::Quit);
        commands
    }

    fn render_emulation(&mut self, _frame: &FrameBuffer, fps: f32) {
        self.frames_left = self.frames_left.saturating_sub(1);
        self.rendered += 1;
        self.last_fps = fps;
    }

    fn render_other(&mut self, _state: AppState) {}

    fn show_message(&mut self, message: &str) {
        println!("  {message}");
    }

    fn debugger(&mut self) -> Option<&mut dyn Debugger> {
        Some(&mut self.debugger)
    }
}

/// Execute the run command
pub fn execute(args: RunArgs, settings: Settings) -> Result<()> {
    let load = parse_slot(args.load)?;
    let save = parse_slot(args.save)?;

    let layout = if args.pal {
        FrameLayout::Pal
    } else {
        FrameLayout::Ntsc
    };
    let cartridge = CartridgeIdentity::new(args.name, "F8");
    let mut machine = DemoMachine::new(cartridge, layout, args.seed);
    if let Some(address) = args.breakpoint {
        machine.add_breakpoint(address);
    }

    let mut states = StateManager::new(settings);
    println!("=== Run ===");
    println!("  Cartridge: {}", machine.cartridge());
    println!("  Time Machine: {:?}", states.mode());
    if let Some(slot) = load {
        let message = states.load_state(&mut machine, Some(slot))?;
        println!("  {message}");
    }

    let mut finale = Commands::new();
    if let Some(count) = args.rewind {
        finale.push(Command::Rewind(count));
    }
    if let Some(slot) = save {
        finale.push(Command::SaveState(Some(slot)));
    }

    let frontend = HeadlessFrontend {
        frames_left: args.frames,
        finale: Some(finale),
        rendered: 0,
        last_fps: 0.0,
        debugger: RecordingDebugger::default(),
    };
    let mut scheduler = Scheduler::with_machine(machine, states, frontend, SystemClock);
    scheduler.run()?;

    let stats = scheduler.stats();
    let frontend = scheduler.frontend();
    for trap in &frontend.debugger.traps {
        println!("  Stopped: {} ({})", trap.message, trap.tool_tip);
    }
    for error in &frontend.debugger.fatal_errors {
        println!("  Fatal: {error}");
    }
    println!(
        "  Frames: {}  Cycles: {}  Timeslices: {}  FPS: {:.1}",
        frontend.rendered, stats.cycles, stats.timeslices, frontend.last_fps
    );
    println!(
        "  History: {} states, {} bytes",
        scheduler.states().rewind_manager().len(),
        scheduler.states().rewind_manager().memory_usage()
    );
    Ok(())
}
