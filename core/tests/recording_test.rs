use chrono::{DateTime, TimeZone, Utc};
use shuffleboard_core::{
    Clock, CollectingDiagnostics, EventImportance, InMemoryNamespace, Namespace, RecordingState,
    Shuffleboard, Value,
};
use std::sync::{Arc, Mutex};

/// Clock the test can move forward
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap(),
        )))
    }

    fn advance_days(&self, days: i64) {
        let mut now = self.0.lock().unwrap();
        *now += chrono::Duration::days(days);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn setup() -> (
    Arc<InMemoryNamespace>,
    Arc<CollectingDiagnostics>,
    Arc<ManualClock>,
    Shuffleboard,
) {
    let ns = InMemoryNamespace::new();
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let clock = ManualClock::new();
    let board = Shuffleboard::with_diagnostics(ns.clone(), diagnostics.clone())
        .with_clock(clock.clone());
    (ns, diagnostics, clock, board)
}

#[test]
fn start_twice_is_start_once() {
    let (ns, _d, _c, board) = setup();
    let mut rx = ns.subscribe();

    board.start_recording();
    let first = board.recording().active_session().unwrap();
    board.start_recording();

    assert_eq!(board.recording_state(), RecordingState::Recording);
    assert_eq!(board.recording().active_session().unwrap(), first);

    let mut record_data_writes = 0;
    while let Ok(n) = rx.try_recv() {
        if n.path == "/Shuffleboard/.recording/RecordData" {
            record_data_writes += 1;
        }
    }
    assert_eq!(record_data_writes, 1);
}

#[test]
fn default_format_resolves_time() {
    let (ns, _d, _c, board) = setup();
    board.start_recording();

    let session = board.recording().active_session().unwrap();
    assert_eq!(session.file_name_format, "recording-${time}");
    assert_eq!(session.file_name, "recording-2024-03-09_18-30-00");
    assert_eq!(
        ns.get("/Shuffleboard/.recording/FileName"),
        Some(Value::from("recording-2024-03-09_18-30-00"))
    );
    assert_eq!(
        ns.get("/Shuffleboard/.recording/RecordData"),
        Some(Value::Boolean(true))
    );
}

#[test]
fn custom_format_substitutes_date() {
    let (_ns, _d, _c, board) = setup();
    board.set_recording_file_name_format("run-${date}");
    board.start_recording();

    let name = board.recording().active_session().unwrap().file_name;
    assert_eq!(name, "run-2024-03-09");
    assert!(!name.contains("${date}"));
}

#[test]
fn format_change_applies_to_next_session_only() {
    let (ns, _d, clock, board) = setup();
    board.start_recording();
    board.set_recording_file_name_format("practice-${date}");

    assert_eq!(
        board.recording().active_session().unwrap().file_name,
        "recording-2024-03-09_18-30-00"
    );

    board.stop_recording();
    assert_eq!(board.recording_state(), RecordingState::Idle);
    assert_eq!(
        ns.get("/Shuffleboard/.recording/RecordData"),
        Some(Value::Boolean(false))
    );

    clock.advance_days(1);
    board.start_recording();
    assert_eq!(
        board.recording().active_session().unwrap().file_name,
        "practice-2024-03-10"
    );

    board.stop_recording();
    board.clear_recording_file_name_format();
    assert_eq!(board.recording().file_name_format(), "recording-${time}");
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let (ns, diagnostics, _c, board) = setup();
    board.stop_recording();
    board.stop_recording();

    assert_eq!(board.recording_state(), RecordingState::Idle);
    assert_eq!(ns.write_count(), 0);
    assert!(diagnostics.reports().is_empty());
}

#[test]
fn empty_event_name_writes_nothing_and_reports_once() {
    let (ns, diagnostics, _c, board) = setup();
    let marker = board.add_event_marker("", Some("desc"), Some(EventImportance::Critical));

    assert!(marker.is_none());
    assert_eq!(ns.write_count(), 0);
    assert_eq!(diagnostics.reports().len(), 1);
    assert_eq!(diagnostics.errors().len(), 1);
}

#[test]
fn missing_importance_writes_nothing() {
    let (ns, diagnostics, _c, board) = setup();
    assert!(board.add_event_marker("Brownout", None, None).is_none());
    assert_eq!(ns.write_count(), 0);
    assert!(diagnostics.errors()[0].contains("importance"));
}

#[test]
fn event_marker_is_published_under_events() {
    let (ns, diagnostics, _c, board) = setup();
    let marker = board
        .add_event_marker("Intake jam", None, Some(EventImportance::High))
        .unwrap();

    assert_eq!(marker.description, "");
    assert!(diagnostics.reports().is_empty());
    let info = ns
        .get("/Shuffleboard/.recording/events/Intake jam/Info")
        .expect("event info");
    let info = info.as_string_array().unwrap();
    assert_eq!(info[0], "");
    assert_eq!(info[1], "HIGH");
}
