//! Save slots alongside the Time Machine

use std::fs;

use crate::state::{Mode, Slot, inspect};
use crate::test_utils::{demo_machine, fingerprint, state_manager};

use super::test_utils::*;

/// Loading a slot restores the machine but leaves the history alone
#[test]
fn test_load_slot_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();

    record_frames(&mut states, &mut machine, 10);
    states.save_state(&machine, Slot::new(5)).unwrap();
    let saved = fingerprint(&machine);

    record_frames(&mut states, &mut machine, 10);
    assert_eq!(states.rewind_manager().len(), 20);

    states.load_state(&mut machine, Slot::new(5)).unwrap();
    assert_eq!(fingerprint(&machine), saved);
    assert_eq!(states.rewind_manager().len(), 20);
}

/// A slot saved mid-history can be loaded after rewinding elsewhere
#[test]
fn test_slot_survives_rewind() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();

    let recorded = record_frames(&mut states, &mut machine, 30);
    states.save_state(&machine, None).unwrap();

    states.rewind_states(&mut machine, 20).unwrap();
    assert_eq!(fingerprint(&machine), recorded[&10]);

    states.load_state(&mut machine, None).unwrap();
    assert_eq!(fingerprint(&machine), recorded[&30]);
}

/// Every slot writes its own file next to the others
#[test]
fn test_all_slots_are_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();

    for slot in Slot::all() {
        machine.run_frames(1);
        states.save_state(&machine, Some(slot)).unwrap();
    }

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let expected: Vec<String> = (0..10).map(|n| format!("Demo Cart.st{n}")).collect();
    assert_eq!(names, expected);

    for name in &names {
        let bytes = fs::read(dir.path().join(name)).unwrap();
        assert!(inspect(&bytes).unwrap().is_compatible());
    }
}

/// Slots work with the Time Machine switched off
#[test]
fn test_slots_without_time_machine() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    states.toggle_time_machine();
    assert_eq!(states.mode(), Mode::Off);

    let mut machine = demo_machine();
    record_frames(&mut states, &mut machine, 5);
    assert!(states.rewind_manager().is_empty());

    states.save_state(&machine, None).unwrap();
    let saved = fingerprint(&machine);
    machine.run_frames(5);
    states.load_state(&mut machine, None).unwrap();
    assert_eq!(fingerprint(&machine), saved);
}
