//! Debugger hook
//!
//! The scheduler enters the debugger when a timeslice ends on a trap, and
//! when a fatal emulation error occurs while a debugger is attached.

use crate::dispatch::TrapInfo;

/// Interactive debugger attached to the scheduler
pub trait Debugger {
    /// A breakpoint or trap stopped the machine
    fn start(&mut self, trap: &TrapInfo);

    /// The machine hit a fatal error; show it to the user
    fn start_with_fatal_error(&mut self, message: &str);
}

/// Debugger that only records what it was asked to show
///
/// Used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingDebugger {
    pub traps: Vec<TrapInfo>,
    pub fatal_errors: Vec<String>,
}

impl Debugger for RecordingDebugger {
    fn start(&mut self, trap: &TrapInfo) {
        tracing::info!(
            address = ?trap.address,
            message = %trap.message,
            "Entering debugger"
        );
        self.traps.push(trap.clone());
    }

    fn start_with_fatal_error(&mut self, message: &str) {
        tracing::error!(%message, "Entering debugger after fatal error");
        self.fatal_errors.push(message.to_string());
    }
}
