//! Shared test utilities for integration and unit tests

use std::collections::VecDeque;
use std::path::Path;

use smallvec::smallvec;

use crate::codec::Snapshot;
use crate::config::{Config, Settings};
use crate::debugger::{Debugger, RecordingDebugger};
use crate::machine::{CartridgeIdentity, DemoMachine, FrameBuffer, FrameLayout, Machine};
use crate::scheduler::{AppState, Command, Commands, Frontend};
use crate::state::StateManager;

// ============================================================================
// Machines
// ============================================================================

pub const DEMO_SEED: u32 = 0x2600;

pub fn demo_cartridge() -> CartridgeIdentity {
    CartridgeIdentity::new("Demo Cart", "F8")
}

/// NTSC demo machine with a fixed seed
pub fn demo_machine() -> DemoMachine {
    DemoMachine::new(demo_cartridge(), FrameLayout::Ntsc, DEMO_SEED)
}

/// Checksum of the machine's complete serialized state
pub fn fingerprint<M: Machine + ?Sized>(machine: &M) -> u64 {
    Snapshot::capture(machine)
        .expect("machine state should serialize")
        .checksum()
}

// ============================================================================
// State Manager
// ============================================================================

/// State manager with in-memory default settings, saving under `dir`
pub fn state_manager(dir: &Path) -> StateManager {
    let mut config = Config::default();
    config.state_dir = Some(dir.to_path_buf());
    StateManager::new(Settings::in_memory(config))
}

// ============================================================================
// Scripted Frontend
// ============================================================================

/// Frontend that replays a fixed command script and records everything shown
///
/// Each poll consumes one batch; once the script runs out it asks to quit.
#[derive(Debug, Default)]
pub struct ScriptedFrontend {
    script: VecDeque<Commands>,
    pub polled_states: Vec<AppState>,
    pub frames: Vec<u64>,
    pub fps: Vec<f32>,
    pub other_renders: Vec<AppState>,
    pub messages: Vec<String>,
    pub debugger: Option<RecordingDebugger>,
}

impl ScriptedFrontend {
    pub fn new(script: Vec<Vec<Command>>) -> Self {
        Self {
            script: script.into_iter().map(Commands::from_vec).collect(),
            ..Self::default()
        }
    }

    /// Script of `polls` empty batches
    pub fn idle(polls: usize) -> Self {
        Self::new(vec![Vec::new(); polls])
    }

    pub fn with_debugger(mut self) -> Self {
        self.debugger = Some(RecordingDebugger::default());
        self
    }

    /// Append more batches to the script
    pub fn push(&mut self, commands: Vec<Command>) {
        self.script.push_back(Commands::from_vec(commands));
    }
}

impl Frontend for ScriptedFrontend {
    fn poll(&mut self, state: AppState) -> Commands {
        self.polled_states.push(state);
        self.script
            .pop_front()
            .unwrap_or_else(|| smallvec![Command::Quit])
    }

    fn render_emulation(&mut self, frame: &FrameBuffer, fps: f32) {
        self.frames.push(frame.fingerprint());
        self.fps.push(fps);
    }

    fn render_other(&mut self, state: AppState) {
        self.other_renders.push(state);
    }

    fn show_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn debugger(&mut self) -> Option<&mut dyn Debugger> {
        self.debugger.as_mut().map(|d| d as &mut dyn Debugger)
    }
}
