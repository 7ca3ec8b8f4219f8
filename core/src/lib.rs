//! Timeslice Core - real-time emulation scheduling with Time Machine state history
//!
//! This crate drives an emulated machine at wall-clock pace and keeps a
//! bounded history of whole-machine snapshots that can be rewound and
//! replayed without corrupting the live machine.
//!
//! # Architecture
//!
//! - [`Machine`] - Contract implemented by an emulated device (step, save, load)
//! - [`EmulationWorker`] - Runs one timeslice of a machine on a dedicated thread
//! - [`Scheduler`] - Main loop pacing emulated cycles against real time
//! - [`StateManager`] - Time Machine mode, save slots and periodic captures
//! - [`RewindManager`] - Bounded snapshot history with rewind/unwind

pub mod clock;
pub mod codec;
pub mod config;
pub mod debugger;
pub mod dispatch;
pub mod fps;
#[cfg(test)]
mod integration;
pub mod machine;
pub mod pacing;
pub mod rewind;
pub mod scheduler;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod worker;

// Re-export core traits and types
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CodecError, Deserializer, Serializer, Snapshot};
pub use config::{Config, ConfigError, Settings, TimeMachineConfig};
pub use debugger::{Debugger, RecordingDebugger};
pub use dispatch::{DispatchResult, DispatchStatus, TrapInfo};
pub use fps::FpsMeter;
pub use machine::{
    Advance, CartridgeIdentity, DemoMachine, EmulationTiming, FrameBuffer, FrameLayout, Machine,
    StopReason,
};
pub use pacing::{Pace, VirtualClock};
pub use rewind::{CaptureKind, RewindConfig, RewindError, RewindManager, WindReport};
pub use scheduler::{
    AppState, Command, Commands, Frontend, LoopControl, Scheduler, SchedulerError, SchedulerStats,
};
pub use state::{Mode, Slot, StateError, StateManager};
pub use worker::{EmulationWorker, RunningSlice, SliceOutcome, TimesliceTask};
