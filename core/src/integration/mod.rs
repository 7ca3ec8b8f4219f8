//! Integration tests for Timeslice core
//!
//! Tests Time Machine history over long runs, save slots alongside the
//! history, and the scheduler against a real clock.

#[cfg(test)]
mod save_slot_tests;

#[cfg(test)]
pub(crate) mod test_utils {
    use hashbrown::HashMap;

    use crate::machine::{DemoMachine, Machine};
    use crate::state::StateManager;
    use crate::test_utils::fingerprint;

    /// Run `frames` frames, capturing after each one like the scheduler does
    ///
    /// Returns the fingerprint of the machine at every captured frame, keyed
    /// by the history's frame number.
    pub fn record_frames(
        states: &mut StateManager,
        machine: &mut DemoMachine,
        frames: u64,
    ) -> HashMap<u64, u64> {
        let mut recorded = HashMap::new();
        for _ in 0..frames {
            machine.run_frames(1);
            states.update(&*machine);
            if let Some(entry) = states.rewind_manager().current_entry()
                && entry.cycles() == machine.cycles()
            {
                recorded.insert(entry.frame(), fingerprint(&*machine));
            }
        }
        recorded
    }
}
