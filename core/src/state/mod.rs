//! State Manager
//!
//! Owns the Time Machine mode, the current save slot and the rewind history.
//! Slot operations return the message to show the user; failures are
//! [`StateError`] values whose `Display` text is that message.

mod format;
mod slot;

pub use format::{FORMAT_TAG, FormatError, HeaderInfo, inspect, read_header, write_header};
pub use slot::Slot;

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{CodecError, Deserializer, Serializer, load_committed};
use crate::config::Settings;
use crate::machine::Machine;
use crate::rewind::{CaptureKind, RewindConfig, RewindError, RewindManager, WindReport};

/// Label of periodic captures
pub const TIME_MACHINE_LABEL: &str = "Time Machine";

/// State-saving mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    /// One history capture per rendered frame
    TimeMachine,
}

/// Failed slot operation; the `Display` text is the user-facing message
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Can't open/save to state file {slot}")]
    OpenForSave {
        slot: Slot,
        #[source]
        source: io::Error,
    },

    #[error("Error saving state {slot}")]
    SaveFailed { slot: Slot, detail: String },

    #[error("Can't open/load from state file {slot}")]
    OpenForLoad {
        slot: Slot,
        #[source]
        source: io::Error,
    },

    #[error("Incompatible state {slot} file")]
    IncompatibleFormat { slot: Slot },

    #[error("State {slot} file doesn't match current ROM")]
    CartridgeMismatch { slot: Slot },

    #[error("Invalid data in state {slot} file")]
    InvalidData {
        slot: Slot,
        #[source]
        source: CodecError,
    },
}

impl StateError {
    pub fn slot(&self) -> Slot {
        match self {
            StateError::OpenForSave { slot, .. }
            | StateError::SaveFailed { slot, .. }
            | StateError::OpenForLoad { slot, .. }
            | StateError::IncompatibleFormat { slot }
            | StateError::CartridgeMismatch { slot }
            | StateError::InvalidData { slot, .. } => *slot,
        }
    }
}

/// Coordinates save slots and the Time Machine
#[derive(Debug)]
pub struct StateManager {
    settings: Settings,
    rewind: RewindManager,
    mode: Mode,
    current_slot: Slot,
}

impl StateManager {
    pub fn new(settings: Settings) -> Self {
        let rewind = RewindManager::new(RewindConfig::from(settings.time_machine_profile()));
        let mode = mode_from(&settings);
        Self {
            settings,
            rewind,
            mode,
            current_slot: Slot::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_slot(&self) -> Slot {
        self.current_slot
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn rewind_manager(&self) -> &RewindManager {
        &self.rewind
    }

    pub fn rewind_manager_mut(&mut self) -> &mut RewindManager {
        &mut self.rewind
    }

    /// Path of a slot file for `machine`'s cartridge
    pub fn slot_path<M: Machine + ?Sized>(&self, machine: &M, slot: Slot) -> PathBuf {
        slot.path(&self.settings.state_dir(), machine.cartridge())
    }

    /// Switch the Time Machine on or off and persist the choice
    pub fn toggle_time_machine(&mut self) -> String {
        self.mode = match self.mode {
            Mode::TimeMachine => Mode::Off,
            Mode::Off => Mode::TimeMachine,
        };
        let enabled = self.mode == Mode::TimeMachine;
        self.settings.set_time_machine_enabled(enabled);
        if let Err(e) = self.settings.persist() {
            warn!(error = %e, "Failed to persist Time Machine setting");
        }

        if enabled {
            "Time Machine enabled".to_string()
        } else {
            "Time Machine disabled".to_string()
        }
    }

    /// Per-frame hook; captures a history entry in Time Machine mode
    pub fn update<M: Machine + ?Sized>(&mut self, machine: &M) {
        if self.mode != Mode::TimeMachine {
            return;
        }
        if let Err(e) = self
            .rewind
            .add_state(machine, TIME_MACHINE_LABEL, CaptureKind::Periodic)
        {
            warn!(error = %e, "Time Machine capture failed");
        }
    }

    /// Capture a labelled entry outside the periodic schedule
    pub fn add_extra_state<M: Machine + ?Sized>(
        &mut self,
        machine: &M,
        label: &str,
    ) -> Result<bool, RewindError> {
        if self.mode != Mode::TimeMachine {
            return Err(RewindError::NotTimeMachine);
        }
        self.rewind.add_state(machine, label, CaptureKind::Extra)
    }

    /// Move through the history and describe the move
    pub fn wind_states<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        count: usize,
        unwind: bool,
    ) -> Result<String, RewindError> {
        let report = self.rewind.wind_states(machine, count, unwind)?;
        Ok(wind_message(machine, &report, unwind))
    }

    pub fn rewind_states<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        count: usize,
    ) -> Result<String, RewindError> {
        self.wind_states(machine, count, false)
    }

    pub fn unwind_states<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        count: usize,
    ) -> Result<String, RewindError> {
        self.wind_states(machine, count, true)
    }

    /// Save to `slot`, or to the current slot
    pub fn save_state<M: Machine + ?Sized>(
        &mut self,
        machine: &M,
        slot: Option<Slot>,
    ) -> Result<String, StateError> {
        let slot = slot.unwrap_or(self.current_slot);
        let path = self.slot_path(machine, slot);

        write_atomic(&path, slot, |out| self.save_state_to(machine, out))?;
        info!(%slot, path = %path.display(), "State saved");

        let mut message = format!("State {slot} saved");
        if self.settings.autoslot() {
            self.current_slot = slot.next();
            message.push_str(&format!(", switching to slot {}", self.current_slot));
        }
        Ok(message)
    }

    /// Load from `slot`, or from the current slot
    ///
    /// On any failure the machine is left as it was.
    pub fn load_state<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        slot: Option<Slot>,
    ) -> Result<String, StateError> {
        let slot = slot.unwrap_or(self.current_slot);
        let path = self.slot_path(machine, slot);

        let bytes = fs::read(&path).map_err(|source| StateError::OpenForLoad { slot, source })?;
        self.load_state_from(machine, &mut Deserializer::new(&bytes))
            .map_err(|e| match e {
                FormatError::IncompatibleFormat { .. } => StateError::IncompatibleFormat { slot },
                FormatError::CartridgeMismatch { .. } => StateError::CartridgeMismatch { slot },
                FormatError::Codec(source) => StateError::InvalidData { slot, source },
            })?;

        info!(%slot, path = %path.display(), "State loaded");
        Ok(format!("State {slot} loaded"))
    }

    /// Advance the current slot, wrapping after 9
    pub fn change_state(&mut self) -> String {
        self.current_slot = self.current_slot.next();
        format!("Changed to slot {}", self.current_slot)
    }

    /// Write a complete save state (header and snapshot) to a stream
    pub fn save_state_to<M: Machine + ?Sized>(
        &self,
        machine: &M,
        out: &mut Serializer,
    ) -> Result<(), CodecError> {
        write_header(out, machine.cartridge());
        machine.save(out)
    }

    /// Read a complete save state from a stream, all or nothing
    pub fn load_state_from<M: Machine + ?Sized>(
        &self,
        machine: &mut M,
        input: &mut Deserializer<'_>,
    ) -> Result<(), FormatError> {
        read_header(input, machine.cartridge())?;
        load_committed(machine, input)?;
        Ok(())
    }

    /// Drop the history and re-read mode and history settings
    ///
    /// Called whenever a cartridge is (re)loaded.
    pub fn reset(&mut self) {
        self.rewind
            .reconfigure(RewindConfig::from(self.settings.time_machine_profile()));
        self.mode = mode_from(&self.settings);
        debug!(mode = ?self.mode, "State manager reset");
    }
}

fn mode_from(settings: &Settings) -> Mode {
    if settings.time_machine_enabled() {
        Mode::TimeMachine
    } else {
        Mode::Off
    }
}

fn wind_message<M: Machine + ?Sized>(machine: &M, report: &WindReport, unwind: bool) -> String {
    let verb = if unwind { "Unwind" } else { "Rewind" };
    let plural = if report.steps == 1 { "" } else { "s" };
    let delta = report.to_cycles.abs_diff(report.from_cycles);
    let seconds = machine.timing().cycles_to_duration(delta).as_secs_f64();
    let sign = if report.to_cycles >= report.from_cycles {
        '+'
    } else {
        '-'
    };
    format!("{verb} {} state{plural} ({sign}{seconds:.2}s)", report.steps)
}

fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "state path has no file name")
    })?;
    let mut tmp_name = OsString::from(name);
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

/// Compose a file in memory, then replace `path` with it atomically
fn write_atomic(
    path: &Path,
    slot: Slot,
    compose: impl FnOnce(&mut Serializer) -> Result<(), CodecError>,
) -> Result<(), StateError> {
    let open_err = |source| StateError::OpenForSave { slot, source };

    let tmp_path = temp_path(path).map_err(open_err)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(open_err)?;
    }
    let mut file = fs::File::create(&tmp_path).map_err(open_err)?;

    let mut out = Serializer::new();
    let written = compose(&mut out)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            file.write_all(out.as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| e.to_string())
        });
    drop(file);

    let result = written.and_then(|()| {
        #[cfg(windows)]
        {
            if path.exists() {
                // Windows rename fails if destination exists.
                fs::remove_file(path).map_err(|e| e.to_string())?;
            }
        }
        fs::rename(&tmp_path, path).map_err(|e| e.to_string())
    });

    result.map_err(|detail| {
        let _ = fs::remove_file(&tmp_path);
        warn!(%slot, %detail, "Failed to write state file");
        StateError::SaveFailed { slot, detail }
    })
}

#[cfg(test)]
mod tests;
