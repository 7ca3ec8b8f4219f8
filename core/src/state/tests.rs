//! State Manager tests

use std::fs;

use super::*;
use crate::config::{Config, Settings};
use crate::machine::{CartridgeIdentity, DemoMachine, FrameLayout};
use crate::test_utils::{demo_machine, fingerprint, state_manager};

#[test]
fn test_save_then_load_restores_machine() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();
    machine.run_frames(5);
    let saved = fingerprint(&machine);

    let message = states.save_state(&machine, Slot::new(2)).unwrap();
    assert_eq!(message, "State 2 saved");
    assert!(dir.path().join("Demo Cart.st2").exists());

    machine.run_frames(3);
    assert_ne!(fingerprint(&machine), saved);

    let message = states.load_state(&mut machine, Slot::new(2)).unwrap();
    assert_eq!(message, "State 2 loaded");
    assert_eq!(fingerprint(&machine), saved);
}

#[test]
fn test_save_uses_current_slot_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let machine = demo_machine();

    states.save_state(&machine, None).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["Demo Cart.st0".to_string()]);
}

#[test]
fn test_saved_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let machine = demo_machine();
    states.save_state(&machine, None).unwrap();

    let bytes = fs::read(dir.path().join("Demo Cart.st0")).unwrap();
    let info = inspect(&bytes).unwrap();
    assert_eq!(info.format_tag, "06000000state");
    assert_eq!(info.cartridge_kind, "F8");
    assert!(info.payload_len > 0);
}

#[test]
fn test_missing_slot_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();

    let err = states.load_state(&mut machine, Slot::new(3)).unwrap_err();
    assert_eq!(err.to_string(), "Can't open/load from state file 3");
    assert_eq!(err.slot(), Slot::new(3).unwrap());
}

#[test]
fn test_incompatible_format_is_rejected_without_touching_machine() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();
    machine.run_frames(1);

    let mut out = Serializer::new();
    out.put_string("05090000state");
    out.put_string("F8");
    machine.save(&mut out).unwrap();
    fs::write(dir.path().join("Demo Cart.st0"), out.as_bytes()).unwrap();

    machine.run_frames(1);
    let before = fingerprint(&machine);

    let err = states.load_state(&mut machine, None).unwrap_err();
    assert_eq!(err.to_string(), "Incompatible state 0 file");
    assert_eq!(fingerprint(&machine), before);
}

#[test]
fn test_cartridge_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());

    let original = demo_machine();
    states.save_state(&original, Slot::new(1)).unwrap();

    // Same name, different bank-switching type
    let mut other = DemoMachine::new(
        CartridgeIdentity::new("Demo Cart", "E0"),
        FrameLayout::Ntsc,
        99,
    );
    other.run_frames(2);
    let before = fingerprint(&other);

    let err = states.load_state(&mut other, Slot::new(1)).unwrap_err();
    assert_eq!(err.to_string(), "State 1 file doesn't match current ROM");
    assert_eq!(fingerprint(&other), before);
}

#[test]
fn test_truncated_payload_is_invalid_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();
    machine.run_frames(1);
    states.save_state(&machine, None).unwrap();

    let path = dir.path().join("Demo Cart.st0");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 40]).unwrap();

    machine.run_frames(2);
    let before = fingerprint(&machine);

    let err = states.load_state(&mut machine, None).unwrap_err();
    assert_eq!(err.to_string(), "Invalid data in state 0 file");
    assert!(matches!(err, StateError::InvalidData { .. }));
    assert_eq!(fingerprint(&machine), before);
}

#[test]
fn test_unwritable_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the state directory should be
    let blocker = dir.path().join("states");
    fs::write(&blocker, b"not a directory").unwrap();

    let mut states = state_manager(&blocker);
    let machine = demo_machine();

    let err = states.save_state(&machine, Slot::new(4)).unwrap_err();
    assert_eq!(err.to_string(), "Can't open/save to state file 4");
}

#[test]
fn test_autoslot_advances_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.state_dir = Some(dir.path().to_path_buf());
    config.autoslot = true;
    let mut states = StateManager::new(Settings::in_memory(config));
    let machine = demo_machine();

    let message = states.save_state(&machine, Slot::new(3)).unwrap();
    assert_eq!(message, "State 3 saved, switching to slot 4");
    assert_eq!(states.current_slot(), Slot::new(4).unwrap());

    let message = states.save_state(&machine, Slot::new(9)).unwrap();
    assert_eq!(message, "State 9 saved, switching to slot 0");
}

#[test]
fn test_ten_autoslot_saves_wrap_back_to_first_slot() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.state_dir = Some(dir.path().to_path_buf());
    config.autoslot = true;
    let mut states = StateManager::new(Settings::in_memory(config));
    let machine = demo_machine();
    assert_eq!(states.current_slot(), Slot::new(0).unwrap());

    for n in 0..10u8 {
        let message = states.save_state(&machine, None).unwrap();
        let next = (n + 1) % 10;
        assert_eq!(message, format!("State {n} saved, switching to slot {next}"));
    }
    assert_eq!(states.current_slot(), Slot::new(0).unwrap());
    for slot in Slot::all() {
        assert!(slot.path(dir.path(), machine.cartridge()).exists());
    }
}

#[test]
fn test_change_state_cycles_through_ten_slots() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());

    assert_eq!(states.change_state(), "Changed to slot 1");
    for _ in 0..9 {
        states.change_state();
    }
    assert_eq!(states.current_slot(), Slot::new(0).unwrap());
}

#[test]
fn test_toggle_persists_to_active_profile() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut settings = Settings::load(config_path.clone()).unwrap();
    settings.config_mut().developer_settings = true;
    let mut states = StateManager::new(settings);
    assert_eq!(states.mode(), Mode::TimeMachine);

    assert_eq!(states.toggle_time_machine(), "Time Machine disabled");
    assert_eq!(states.mode(), Mode::Off);

    let saved = crate::config::load_from(&config_path).unwrap();
    assert!(!saved.developer.time_machine);
    assert!(saved.player.time_machine);

    assert_eq!(states.toggle_time_machine(), "Time Machine enabled");
    let saved = crate::config::load_from(&config_path).unwrap();
    assert!(saved.developer.time_machine);
}

#[test]
fn test_update_captures_only_in_time_machine_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();

    machine.run_frames(1);
    states.update(&machine);
    assert_eq!(states.rewind_manager().len(), 1);
    assert_eq!(
        states.rewind_manager().current_entry().unwrap().label(),
        TIME_MACHINE_LABEL
    );

    states.toggle_time_machine();
    machine.run_frames(1);
    states.update(&machine);
    assert_eq!(states.rewind_manager().len(), 1);

    assert_eq!(
        states.add_extra_state(&machine, "Before reset"),
        Err(RewindError::NotTimeMachine)
    );
}

#[test]
fn test_wind_messages() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();

    for _ in 0..4 {
        machine.run_frames(1);
        states.update(&machine);
    }

    let message = states.rewind_states(&mut machine, 2).unwrap();
    assert_eq!(message, "Rewind 2 states (-0.03s)");

    let message = states.unwind_states(&mut machine, 1).unwrap();
    assert_eq!(message, "Unwind 1 state (+0.02s)");

    // Clamped to the newest entry
    states.unwind_states(&mut machine, 5).unwrap();
    assert_eq!(
        states.unwind_states(&mut machine, 1),
        Err(RewindError::AtNewest)
    );
}

#[test]
fn test_stream_round_trip_and_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let states = state_manager(dir.path());
    let mut machine = demo_machine();
    machine.run_frames(2);
    let saved = fingerprint(&machine);

    let mut out = Serializer::new();
    states.save_state_to(&machine, &mut out).unwrap();
    let bytes = out.into_bytes();

    machine.run_frames(1);
    states
        .load_state_from(&mut machine, &mut Deserializer::new(&bytes))
        .unwrap();
    assert_eq!(fingerprint(&machine), saved);

    let mut pal = DemoMachine::new(
        CartridgeIdentity::new("Demo Cart", "F8SC"),
        FrameLayout::Pal,
        1,
    );
    let err = states
        .load_state_from(&mut pal, &mut Deserializer::new(&bytes))
        .unwrap_err();
    assert!(matches!(err, FormatError::CartridgeMismatch { .. }));
}

#[test]
fn test_reset_clears_history_and_rereads_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut states = state_manager(dir.path());
    let mut machine = demo_machine();
    machine.run_frames(1);
    states.update(&machine);
    assert!(!states.rewind_manager().is_empty());

    states.settings_mut().set_time_machine_enabled(false);
    states.reset();

    assert!(states.rewind_manager().is_empty());
    assert_eq!(states.mode(), Mode::Off);
}
