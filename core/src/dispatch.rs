//! Outcome of one emulation timeslice

/// Details of a debugger trap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapInfo {
    pub message: String,
    pub address: Option<u16>,
    pub was_read_trap: bool,
    pub tool_tip: String,
}

/// How a timeslice ended
///
/// A freshly constructed result is `Invalid`; the worker always overwrites
/// it. The scheduler treats an `Invalid` result as an internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchStatus {
    #[default]
    Invalid,
    Ok,
    Debugger,
    Fatal,
}

/// Result record written by the worker for every timeslice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    status: DispatchStatus,
    cycles: u64,
    message: String,
    address: Option<u16>,
    was_read_trap: bool,
    tool_tip: String,
}

impl DispatchResult {
    pub fn status(&self) -> DispatchStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == DispatchStatus::Ok
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn address(&self) -> Option<u16> {
        self.address
    }

    pub fn was_read_trap(&self) -> bool {
        self.was_read_trap
    }

    pub fn tool_tip(&self) -> &str {
        &self.tool_tip
    }

    /// Trap details, present only for `Debugger` results
    pub fn trap_info(&self) -> Option<TrapInfo> {
        (self.status == DispatchStatus::Debugger).then(|| TrapInfo {
            message: self.message.clone(),
            address: self.address,
            was_read_trap: self.was_read_trap,
            tool_tip: self.tool_tip.clone(),
        })
    }

    pub fn set_ok(&mut self, cycles: u64) {
        *self = Self {
            status: DispatchStatus::Ok,
            cycles,
            ..Self::default()
        };
    }

    pub fn set_debugger(&mut self, cycles: u64, trap: TrapInfo) {
        *self = Self {
            status: DispatchStatus::Debugger,
            cycles,
            message: trap.message,
            address: trap.address,
            was_read_trap: trap.was_read_trap,
            tool_tip: trap.tool_tip,
        };
    }

    pub fn set_fatal(&mut self, cycles: u64, message: impl Into<String>) {
        *self = Self {
            status: DispatchStatus::Fatal,
            cycles,
            message: message.into(),
            ..Self::default()
        };
    }
}
