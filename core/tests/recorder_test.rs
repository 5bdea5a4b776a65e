//! Recorder tests: the `.sbr` stream produced from namespace notifications

use shuffleboard_core::recording::recorder::RECORDING_FILE_EXTENSION;
use shuffleboard_core::{
    read_recording, CollectingDiagnostics, EventImportance, InMemoryNamespace, Namespace,
    RecordEntry, Recorder, Shuffleboard, Value,
};
use std::sync::Arc;

fn drain(
    recorder: &mut Recorder,
    rx: &mut tokio::sync::broadcast::Receiver<shuffleboard_core::EntryNotification>,
) {
    while let Ok(n) = rx.try_recv() {
        recorder.handle(&n).expect("record change");
    }
}

#[test]
fn session_records_values_and_events() {
    let dir = tempfile::tempdir().unwrap();
    let ns = InMemoryNamespace::new();
    let mut rx = ns.subscribe();
    let mut recorder = Recorder::new(dir.path());
    let board = Shuffleboard::with_diagnostics(ns.clone(), Arc::new(CollectingDiagnostics::new()));

    let speed = board.get_tab("Drive").add("Speed", 0.0).unwrap().entry();
    board.update();
    // Not recording yet: nothing is written
    drain(&mut recorder, &mut rx);
    assert!(!recorder.is_recording());

    board.set_recording_file_name_format("match-42");
    board.start_recording();
    speed.set(1.5).unwrap();
    board.add_event_marker("Auto start", Some("begin auto"), Some(EventImportance::Normal));
    board.stop_recording();
    drain(&mut recorder, &mut rx);

    assert!(!recorder.is_recording());
    let file = dir
        .path()
        .join(format!("match-42.{}", RECORDING_FILE_EXTENSION));
    assert_eq!(recorder.finished_files(), &[file.clone()]);

    let entries = read_recording(&file).unwrap();
    assert!(matches!(
        &entries[0],
        RecordEntry::SessionStart { file_name, .. } if file_name == "match-42"
    ));
    assert!(entries.iter().any(|e| matches!(
        e,
        RecordEntry::Value { path, value: Value::Double(v), .. }
            if path == "/Shuffleboard/Drive/Speed" && *v == 1.5
    )));
    assert!(entries.iter().any(|e| matches!(
        e,
        RecordEntry::Event { name, importance: EventImportance::Normal, description, .. }
            if name == "Auto start" && description == "begin auto"
    )));
    assert!(matches!(entries.last(), Some(RecordEntry::SessionEnd { .. })));
    // Control keys are not recorded as values
    assert!(!entries.iter().any(|e| matches!(
        e,
        RecordEntry::Value { path, .. } if path.contains("/.recording/")
    )));
}

#[test]
fn snapshot_captures_existing_values() {
    let dir = tempfile::tempdir().unwrap();
    let ns = InMemoryNamespace::new();
    let mut rx = ns.subscribe();
    let mut recorder = Recorder::new(dir.path()).with_snapshot(ns.clone());
    let board = Shuffleboard::with_diagnostics(ns.clone(), Arc::new(CollectingDiagnostics::new()));

    board.get_tab("Arm").add("Angle", 42.0).unwrap();
    board.update();
    board.start_recording();
    drain(&mut recorder, &mut rx);

    let file = recorder.current_file().unwrap().to_path_buf();
    recorder.finish().unwrap();

    let entries = read_recording(&file).unwrap();
    assert!(entries.iter().any(|e| matches!(
        e,
        RecordEntry::Value { path, .. } if path == "/Shuffleboard/Arm/Angle"
    )));
    assert!(ns.get("/Shuffleboard/Arm/Angle").is_some());
}

#[tokio::test]
async fn spawned_recorder_closes_file_when_namespace_drops() {
    let dir = tempfile::tempdir().unwrap();
    let ns = InMemoryNamespace::new();
    let handle = Recorder::new(dir.path()).spawn(ns.subscribe());

    {
        let board =
            Shuffleboard::with_diagnostics(ns.clone(), Arc::new(CollectingDiagnostics::new()));
        board.set_recording_file_name_format("spawned");
        board.start_recording();
        board.get_tab("Tab").add("x", true).unwrap();
        board.update();
    }
    drop(ns);

    let recorder = handle.await.unwrap();
    let files = recorder.finished_files();
    assert_eq!(files.len(), 1);

    let entries = read_recording(&files[0]).unwrap();
    assert!(matches!(entries.last(), Some(RecordEntry::SessionEnd { .. })));
    assert!(entries.iter().any(|e| matches!(
        e,
        RecordEntry::Value { path, .. } if path == "/Shuffleboard/Tab/x"
    )));
}

#[test]
fn reused_file_name_gets_a_fresh_file() {
    let dir = tempfile::tempdir().unwrap();
    let ns = InMemoryNamespace::new();
    let mut rx = ns.subscribe();
    let mut recorder = Recorder::new(dir.path());
    let board = Shuffleboard::with_diagnostics(ns.clone(), Arc::new(CollectingDiagnostics::new()));
    let x = board.get_tab("Tab").add("x", 0.0).unwrap().entry();

    board.set_recording_file_name_format("match");
    board.start_recording();
    x.set(1.0).unwrap();
    board.stop_recording();
    board.start_recording();
    x.set(2.0).unwrap();
    board.stop_recording();
    drain(&mut recorder, &mut rx);

    let first = dir.path().join("match.sbr");
    let second = dir.path().join("match-1.sbr");
    assert_eq!(recorder.finished_files(), &[first.clone(), second.clone()]);

    let recorded = |file: &std::path::Path, expected: f64| {
        read_recording(file).unwrap().iter().any(|e| matches!(
            e,
            RecordEntry::Value { path, value: Value::Double(v), .. }
                if path == "/Shuffleboard/Tab/x" && *v == expected
        ))
    };
    assert!(recorded(&first, 1.0));
    assert!(!recorded(&first, 2.0));
    assert!(recorded(&second, 2.0));
}

#[test]
fn file_names_escaping_the_directory_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let ns = InMemoryNamespace::new();
    let mut rx = ns.subscribe();
    let mut recorder = Recorder::new(dir.path());

    let absolute = outside.path().join("evil");
    for name in [absolute.to_str().unwrap(), "../evil"] {
        ns.set("/Shuffleboard/.recording/FileName", Value::from(name))
            .unwrap();
        ns.set("/Shuffleboard/.recording/RecordData", Value::Boolean(true))
            .unwrap();
        drain(&mut recorder, &mut rx);
        assert!(!recorder.is_recording());

        ns.set("/Shuffleboard/.recording/RecordData", Value::Boolean(false))
            .unwrap();
        drain(&mut recorder, &mut rx);
    }
    assert!(!outside.path().join("evil.sbr").exists());
    assert!(!dir.path().parent().unwrap().join("evil.sbr").exists());
    assert!(recorder.finished_files().is_empty());

    // A well-formed name still records
    ns.set("/Shuffleboard/.recording/FileName", Value::from("safe"))
        .unwrap();
    ns.set("/Shuffleboard/.recording/RecordData", Value::Boolean(true))
        .unwrap();
    drain(&mut recorder, &mut rx);
    assert_eq!(
        recorder.current_file(),
        Some(dir.path().join("safe.sbr").as_path())
    );
}

#[test]
fn sibling_tables_are_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let ns = InMemoryNamespace::new();
    let mut rx = ns.subscribe();
    let mut recorder = Recorder::new(dir.path());
    let board = Shuffleboard::with_diagnostics(ns.clone(), Arc::new(CollectingDiagnostics::new()));

    board.start_recording();
    ns.set("/ShuffleboardX/y", Value::Double(1.0)).unwrap();
    ns.set("/Shuffleboard/Tab/y", Value::Double(1.0)).unwrap();
    board.stop_recording();
    drain(&mut recorder, &mut rx);

    let entries = read_recording(&recorder.finished_files()[0]).unwrap();
    let paths: Vec<&str> = entries
        .iter()
        .filter_map(|e| match e {
            RecordEntry::Value { path, .. } => Some(path.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(paths, vec!["/Shuffleboard/Tab/y"]);
}
