//! Frontend contract
//!
//! The frontend is whatever presents frames and collects user input. The
//! scheduler polls it once per loop iteration for a batch of commands.

use smallvec::SmallVec;

use crate::debugger::Debugger;
use crate::machine::FrameBuffer;
use crate::state::Slot;

/// What the main loop is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Running the machine in real time
    Emulation,
    /// Showing recorded frames; paced by scanlines of the last frame
    Playback,
    Paused,
    Debugger,
    /// No machine running, or a menu covers it
    Menu,
}

/// User command collected by the frontend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    SetState(AppState),
    /// Save to the given slot, or the current one
    SaveState(Option<Slot>),
    /// Load from the given slot, or the current one
    LoadState(Option<Slot>),
    ChangeSlot,
    ToggleTimeMachine,
    Rewind(usize),
    Unwind(usize),
    AddExtraState(String),
}

/// Commands from one poll; almost always a handful at most
pub type Commands = SmallVec<[Command; 4]>;

/// Presentation and input collaborator of the scheduler
pub trait Frontend {
    /// Collect pending user commands
    fn poll(&mut self, state: AppState) -> Commands;

    /// Present an emulated frame
    ///
    /// Called on the scheduler thread while the next timeslice runs.
    fn render_emulation(&mut self, frame: &FrameBuffer, fps: f32);

    /// Present the UI for a non-emulation state
    fn render_other(&mut self, state: AppState);

    /// Show a transient message to the user
    fn show_message(&mut self, message: &str);

    /// Attached debugger, if any
    fn debugger(&mut self) -> Option<&mut dyn Debugger> {
        None
    }
}
