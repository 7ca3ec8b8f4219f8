//! Emulated machine contract
//!
//! The scheduler, worker, state manager and rewind history only ever talk to
//! a machine through [`Machine`]. A machine is owned by exactly one party at
//! a time: the scheduler thread between timeslices, the worker thread during
//! one.

mod cartridge;
mod demo;
mod frame;
mod timing;

pub use cartridge::CartridgeIdentity;
pub use demo::{DEMO_HEIGHT, DEMO_WIDTH, DemoMachine};
pub use frame::FrameBuffer;
pub use timing::{CYCLES_PER_SCANLINE, EmulationTiming, FrameLayout};

use crate::codec::{CodecError, Deserializer, Serializer};
use crate::dispatch::TrapInfo;

/// Why a call to [`Machine::advance`] returned before its budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A debugger breakpoint or trap fired
    Trap(TrapInfo),
    /// The machine hit an unrecoverable emulation error
    Fatal(String),
}

/// Result of advancing a machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// Cycles actually executed
    pub cycles: u64,
    /// Set when execution stopped early
    pub stop: Option<StopReason>,
}

impl Advance {
    /// Budget fully consumed without incident
    pub fn completed(cycles: u64) -> Self {
        Self { cycles, stop: None }
    }
}

/// An emulated device that can be stepped, rendered and snapshotted
pub trait Machine: Send + 'static {
    /// Identity of the loaded cartridge
    fn cartridge(&self) -> &CartridgeIdentity;

    /// Timing constants for the current frame layout
    fn timing(&self) -> EmulationTiming;

    /// Run for at most `max_cycles` cycles
    ///
    /// Implementations must not execute more than `max_cycles`; they may
    /// return fewer when a trap or fatal error stops execution.
    fn advance(&mut self, max_cycles: u64) -> Advance;

    /// Total cycles executed since power-on
    fn cycles(&self) -> u64;

    /// Whether a completed frame is waiting to be rendered
    fn new_frame_pending(&self) -> bool;

    /// Number of frames completed since the last render
    fn frames_since_last_render(&self) -> u32;

    /// Copy the completed frame out and clear the pending flag
    fn render_to_frame_buffer(&mut self, frame: &mut FrameBuffer);

    /// Scanlines in the most recently completed frame
    fn scanlines_last_frame(&self) -> u32;

    /// Serialize the complete machine state
    fn save(&self, out: &mut Serializer) -> Result<(), CodecError>;

    /// Replace the machine state with one read from `input`
    ///
    /// May leave the machine partially updated on error; callers that need
    /// all-or-nothing behaviour go through [`crate::codec::load_committed`].
    fn load(&mut self, input: &mut Deserializer<'_>) -> Result<(), CodecError>;
}
