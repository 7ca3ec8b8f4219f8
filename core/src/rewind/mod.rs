//! Time Machine history
//!
//! [`RewindManager`] keeps a bounded, ordered history of machine snapshots
//! and a cursor into it. Rewinding moves the cursor toward older entries and
//! loads the target snapshot; unwinding moves back toward the newest entry.
//! Capturing while the cursor is not at the newest entry discards everything
//! after the cursor, like typing after an undo.

mod history;
mod retention;

pub use history::{CaptureKind, EntryInfo, HistoryArena, HistoryEntry};
pub use retention::RetentionPolicy;

use tracing::debug;

use crate::codec::{CodecError, Snapshot};
use crate::config::TimeMachineConfig;
use crate::machine::Machine;

/// History capacity and spacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewindConfig {
    /// Maximum number of entries
    pub size: usize,
    /// Newest entries kept at full density
    pub uncompressed: usize,
    /// Frames between periodic captures
    pub interval: u32,
    /// Frames the full history should reach back
    pub horizon: u64,
    /// Store entries lz4-compressed
    pub compress: bool,
}

impl From<&TimeMachineConfig> for RewindConfig {
    fn from(config: &TimeMachineConfig) -> Self {
        Self {
            size: config.size,
            uncompressed: config.uncompressed,
            interval: config.interval,
            horizon: config.horizon,
            compress: config.compress,
        }
    }
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self::from(&TimeMachineConfig::player())
    }
}

/// Error moving through the history
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewindError {
    #[error("Time Machine history is empty")]
    Empty,

    #[error("Can't rewind any further")]
    AtOldest,

    #[error("Can't unwind any further")]
    AtNewest,

    #[error("Time Machine is disabled")]
    NotTimeMachine,

    #[error("Time Machine state could not be restored: {0}")]
    Codec(#[from] CodecError),
}

/// Outcome of a successful rewind or unwind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindReport {
    /// Entries moved
    pub steps: usize,
    /// Machine cycles before the move
    pub from_cycles: u64,
    /// Machine cycles of the loaded entry
    pub to_cycles: u64,
    /// Label of the loaded entry
    pub label: String,
    /// Cursor after the move
    pub index: usize,
}

/// Bounded snapshot history with a cursor
#[derive(Debug)]
pub struct RewindManager {
    config: RewindConfig,
    retention: RetentionPolicy,
    history: HistoryArena,
    cursor: usize,
    frame_clock: u64,
    last_periodic: Option<u64>,
    next_sequence: u64,
}

impl RewindManager {
    pub fn new(config: RewindConfig) -> Self {
        let retention =
            RetentionPolicy::new(config.size, config.uncompressed, config.interval, config.horizon);
        let history = HistoryArena::new(retention.size());
        Self {
            config,
            retention,
            history,
            cursor: 0,
            frame_clock: 0,
            last_periodic: None,
            next_sequence: 0,
        }
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Apply new capacity and spacing settings
    ///
    /// The history is cleared since its spacing no longer matches.
    pub fn reconfigure(&mut self, config: RewindConfig) {
        if config != self.config {
            *self = Self::new(config);
        } else {
            self.clear();
        }
    }

    /// Capture the machine state as the newest entry
    ///
    /// Periodic captures are counted as frames and skipped until `interval`
    /// frames have passed since the previous periodic capture. Returns
    /// whether an entry was added.
    pub fn add_state<M: Machine + ?Sized>(
        &mut self,
        machine: &M,
        label: &str,
        kind: CaptureKind,
    ) -> Result<bool, RewindError> {
        if kind == CaptureKind::Periodic {
            self.frame_clock += 1;
            if let Some(last) = self.last_periodic
                && self.frame_clock - last < u64::from(self.config.interval.max(1))
            {
                return Ok(false);
            }
            self.last_periodic = Some(self.frame_clock);
        }

        let buffer = self.history.take_buffer();
        let snapshot = Snapshot::capture_into(machine, buffer)?;

        if !self.history.is_empty() && !self.at_last() {
            let dropped = self.history.truncate_after(self.cursor);
            debug!(dropped, cursor = self.cursor, "Discarded redo history");
        }

        if self.history.is_full() {
            let victim = self.retention.select_victim(&self.history.frames());
            self.history.evict(victim);
        }

        let info = EntryInfo {
            sequence: self.next_sequence,
            label: label.to_string(),
            kind,
            cycles: machine.cycles(),
            frame: self.frame_clock,
        };
        let (entry, spare) = HistoryEntry::new(info, snapshot, self.config.compress);
        if let Some(buffer) = spare {
            self.history.recycle(buffer);
        }

        self.cursor = self.history.push_back(entry);
        self.next_sequence += 1;

        debug!(
            sequence = self.next_sequence - 1,
            frame = self.frame_clock,
            len = self.history.len(),
            label,
            "Captured history entry"
        );
        Ok(true)
    }

    /// Move up to `count` entries and load the target
    ///
    /// Moving zero entries (including being at either end already) is an
    /// error and leaves the machine untouched. If the target fails to load
    /// the cursor does not move.
    pub fn wind_states<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        count: usize,
        unwind: bool,
    ) -> Result<WindReport, RewindError> {
        if self.history.is_empty() {
            return Err(RewindError::Empty);
        }

        let last = self.history.len() - 1;
        let target = if unwind {
            self.cursor.saturating_add(count).min(last)
        } else {
            self.cursor.saturating_sub(count)
        };
        if target == self.cursor {
            return Err(if unwind {
                RewindError::AtNewest
            } else {
                RewindError::AtOldest
            });
        }

        let entry = self.history.get(target).ok_or(RewindError::Empty)?;
        let from_cycles = machine.cycles();
        entry.restore_into(machine)?;

        let report = WindReport {
            steps: target.abs_diff(self.cursor),
            from_cycles,
            to_cycles: entry.cycles(),
            label: entry.label().to_string(),
            index: target,
        };
        // Periodic spacing continues from the restored point in time
        self.frame_clock = entry.frame();
        self.last_periodic = Some(entry.frame());
        self.cursor = target;

        debug!(
            steps = report.steps,
            index = target,
            unwind,
            "Moved through history"
        );
        Ok(report)
    }

    /// Move up to `count` entries toward the oldest
    pub fn rewind_states<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        count: usize,
    ) -> Result<WindReport, RewindError> {
        self.wind_states(machine, count, false)
    }

    /// Move up to `count` entries toward the newest
    pub fn unwind_states<M: Machine + ?Sized>(
        &mut self,
        machine: &mut M,
        count: usize,
    ) -> Result<WindReport, RewindError> {
        self.wind_states(machine, count, true)
    }

    /// Drop the whole history
    pub fn clear(&mut self) {
        self.history.clear();
        self.cursor = 0;
        self.frame_clock = 0;
        self.last_periodic = None;
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Cursor position, `None` when empty
    pub fn current_index(&self) -> Option<usize> {
        (!self.history.is_empty()).then_some(self.cursor)
    }

    /// Rank of the newest entry, `None` when empty
    pub fn last_index(&self) -> Option<usize> {
        self.history.len().checked_sub(1)
    }

    pub fn at_first(&self) -> bool {
        self.current_index() == Some(0)
    }

    pub fn at_last(&self) -> bool {
        self.current_index().is_some() && self.current_index() == self.last_index()
    }

    /// Entry under the cursor
    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.current_index().and_then(|i| self.history.get(i))
    }

    /// All entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.history.iter()
    }

    /// Bytes held by the history
    pub fn memory_usage(&self) -> usize {
        self.history.memory_usage()
    }

    #[cfg(test)]
    pub(crate) fn history_mut(&mut self) -> &mut HistoryArena {
        &mut self.history
    }
}

impl Default for RewindManager {
    fn default() -> Self {
        Self::new(RewindConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{demo_machine, fingerprint};

    fn config(size: usize, uncompressed: usize) -> RewindConfig {
        RewindConfig {
            size,
            uncompressed,
            interval: 1,
            horizon: 10_000,
            compress: false,
        }
    }

    #[test]
    fn test_periodic_interval_skips_frames() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::new(RewindConfig {
            interval: 3,
            ..config(10, 10)
        });

        let captured: Vec<bool> = (0..7)
            .map(|_| {
                machine.run_frames(1);
                rewind
                    .add_state(&machine, "Time Machine", CaptureKind::Periodic)
                    .unwrap()
            })
            .collect();

        assert_eq!(
            captured,
            vec![true, false, false, true, false, false, true]
        );
        assert_eq!(rewind.len(), 3);
    }

    #[test]
    fn test_extra_states_ignore_interval() {
        let machine = demo_machine();
        let mut rewind = RewindManager::new(RewindConfig {
            interval: 100,
            ..config(10, 10)
        });

        assert!(rewind.add_state(&machine, "a", CaptureKind::Extra).unwrap());
        assert!(rewind.add_state(&machine, "b", CaptureKind::Extra).unwrap());
        assert_eq!(rewind.len(), 2);
        assert_eq!(rewind.current_entry().unwrap().label(), "b");
    }

    #[test]
    fn test_rewind_loads_older_state() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::new(config(10, 10));

        let mut prints = Vec::new();
        for _ in 0..5 {
            machine.run_frames(1);
            rewind
                .add_state(&machine, "Time Machine", CaptureKind::Periodic)
                .unwrap();
            prints.push(fingerprint(&machine));
        }

        let report = rewind.rewind_states(&mut machine, 2).unwrap();
        assert_eq!(report.steps, 2);
        assert_eq!(report.index, 2);
        assert_eq!(fingerprint(&machine), prints[2]);
        assert!(report.to_cycles < report.from_cycles);
    }

    #[test]
    fn test_wind_clamps_to_history_bounds() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::new(config(10, 10));
        for _ in 0..4 {
            machine.run_frames(1);
            rewind
                .add_state(&machine, "Time Machine", CaptureKind::Periodic)
                .unwrap();
        }

        let report = rewind.rewind_states(&mut machine, 100).unwrap();
        assert_eq!(report.steps, 3);
        assert!(rewind.at_first());

        assert_eq!(
            rewind.rewind_states(&mut machine, 1),
            Err(RewindError::AtOldest)
        );

        let report = rewind.unwind_states(&mut machine, 100).unwrap();
        assert_eq!(report.steps, 3);
        assert!(rewind.at_last());
        assert_eq!(
            rewind.unwind_states(&mut machine, 1),
            Err(RewindError::AtNewest)
        );
    }

    #[test]
    fn test_zero_steps_is_an_error_and_leaves_machine_alone() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::new(config(10, 10));
        for _ in 0..3 {
            machine.run_frames(1);
            rewind
                .add_state(&machine, "Time Machine", CaptureKind::Periodic)
                .unwrap();
        }
        machine.run_frames(1);
        let before = fingerprint(&machine);

        assert_eq!(
            rewind.rewind_states(&mut machine, 0),
            Err(RewindError::AtOldest)
        );
        assert_eq!(fingerprint(&machine), before);
    }

    #[test]
    fn test_empty_history() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::default();
        assert_eq!(
            rewind.rewind_states(&mut machine, 1),
            Err(RewindError::Empty)
        );
        assert_eq!(rewind.current_index(), None);
        assert!(!rewind.at_first());
        assert!(!rewind.at_last());
    }

    #[test]
    fn test_failed_load_keeps_cursor() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::new(config(10, 10));
        for _ in 0..3 {
            machine.run_frames(1);
            rewind
                .add_state(&machine, "Time Machine", CaptureKind::Periodic)
                .unwrap();
        }
        let before = fingerprint(&machine);

        rewind.history_mut().get_mut(1).unwrap().corrupt_payload();
        let err = rewind.rewind_states(&mut machine, 1).unwrap_err();

        assert!(matches!(err, RewindError::Codec(_)));
        assert_eq!(rewind.current_index(), Some(2));
        assert_eq!(fingerprint(&machine), before);
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let mut machine = demo_machine();
        let mut rewind = RewindManager::new(RewindConfig {
            horizon: 200,
            compress: true,
            ..config(8, 3)
        });

        for _ in 0..100 {
            machine.advance(500);
            rewind
                .add_state(&machine, "Time Machine", CaptureKind::Periodic)
                .unwrap();
            assert!(rewind.len() <= 8);
        }
        assert_eq!(rewind.len(), 8);
        assert!(rewind.at_last());

        // Newest entries are consecutive frames
        let frames: Vec<u64> = rewind.entries().map(HistoryEntry::frame).collect();
        assert_eq!(&frames[5..], &[98, 99, 100]);
    }

    #[test]
    fn test_clear_resets_history() {
        let machine = demo_machine();
        let mut rewind = RewindManager::new(config(4, 4));
        rewind
            .add_state(&machine, "Time Machine", CaptureKind::Periodic)
            .unwrap();
        rewind.clear();
        assert!(rewind.is_empty());
        assert_eq!(rewind.memory_usage(), 0);
    }
}
