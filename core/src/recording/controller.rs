// Recording controller
//
// Idle/Recording state machine. Starting resolves the file name template against the
// session start time and tells the remote client, through control keys, to open a file.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::event::{EventImportance, EventMarker};
use super::{
    EVENTS_TABLE, FILE_NAME_FORMAT_KEY, FILE_NAME_KEY, RECORDING_TABLE, RECORD_DATA_KEY,
};
use crate::dashboard::BASE_TABLE_NAME;
use crate::diagnostics::DiagnosticSink;
use crate::namespace::{join_path, Namespace, NamespaceError, Value};

pub const DEFAULT_FILE_NAME_FORMAT: &str = "recording-${time}";

pub const DATE_PLACEHOLDER: &str = "${date}";
pub const TIME_PLACEHOLDER: &str = "${time}";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Source of session start and event timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// The session the remote client is currently writing
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub file_name_format: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
}

/// Substitute `${date}` and `${time}` with the session start time
pub fn resolve_file_name(format: &str, started_at: DateTime<Utc>) -> String {
    format
        .replace(DATE_PLACEHOLDER, &started_at.format(DATE_FORMAT).to_string())
        .replace(TIME_PLACEHOLDER, &started_at.format(TIME_FORMAT).to_string())
}

#[derive(Default)]
struct ControllerState {
    session: Option<RecordingSession>,
    custom_format: Option<String>,
}

pub struct RecordingController {
    namespace: Arc<dyn Namespace>,
    diagnostics: Arc<dyn DiagnosticSink>,
    clock: Arc<dyn Clock>,
    recording_table: String,
    default_format: String,
    state: Mutex<ControllerState>,
}

impl RecordingController {
    pub fn new(namespace: Arc<dyn Namespace>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            namespace,
            diagnostics,
            clock: Arc::new(SystemClock),
            recording_table: join_path(BASE_TABLE_NAME, RECORDING_TABLE),
            default_format: DEFAULT_FILE_NAME_FORMAT.to_string(),
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_base_table(mut self, base_table: &str) -> Self {
        self.recording_table = join_path(base_table, RECORDING_TABLE);
        self
    }

    /// Template used when no custom format is set
    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn key(&self, key: &str) -> String {
        join_path(&self.recording_table, key)
    }

    fn write(&self, path: &str, value: Value) {
        if let Err(e) = self.namespace.set(path, value) {
            self.report_write_failure(path, e);
        }
    }

    fn report_write_failure(&self, path: &str, e: NamespaceError) {
        self.diagnostics
            .report_warning(&format!("Failed to write {}: {}", path, e));
    }

    pub fn state(&self) -> RecordingState {
        if self.lock().session.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    pub fn active_session(&self) -> Option<RecordingSession> {
        self.lock().session.clone()
    }

    /// The format the next session will use
    pub fn file_name_format(&self) -> String {
        self.lock()
            .custom_format
            .clone()
            .unwrap_or_else(|| self.default_format.clone())
    }

    /// Start a session. Has no effect if one is already running.
    pub fn start_recording(&self) {
        let mut state = self.lock();
        if state.session.is_some() {
            debug!(target: "shuffleboard", "Recording already in progress");
            return;
        }

        let started_at = self.clock.now();
        let file_name_format = state
            .custom_format
            .clone()
            .unwrap_or_else(|| self.default_format.clone());
        let file_name = resolve_file_name(&file_name_format, started_at);

        // The client reads the name when RecordData flips, so it goes first
        self.write(
            &self.key(FILE_NAME_FORMAT_KEY),
            Value::String(file_name_format.clone()),
        );
        self.write(&self.key(FILE_NAME_KEY), Value::String(file_name.clone()));
        self.write(&self.key(RECORD_DATA_KEY), Value::Boolean(true));

        info!(target: "shuffleboard", file_name = %file_name, "Recording started");
        state.session = Some(RecordingSession {
            file_name_format,
            file_name,
            started_at,
        });
    }

    /// Stop the running session. Has no effect if none is running.
    pub fn stop_recording(&self) {
        let mut state = self.lock();
        let Some(session) = state.session.take() else {
            debug!(target: "shuffleboard", "No recording in progress");
            return;
        };
        self.write(&self.key(RECORD_DATA_KEY), Value::Boolean(false));
        info!(target: "shuffleboard", file_name = %session.file_name, "Recording stopped");
    }

    /// Set the format for new recordings; a running session keeps its file.
    ///
    /// `${date}` and `${time}` are replaced with the session start date and date+time.
    pub fn set_recording_file_name_format(&self, format: impl Into<String>) {
        let format = format.into();
        debug!(target: "shuffleboard", format = %format, "Recording file name format set");
        self.lock().custom_format = Some(format);
    }

    /// Go back to the default format for new recordings
    pub fn clear_recording_file_name_format(&self) {
        self.lock().custom_format = None;
    }

    /// Publish an event marker.
    ///
    /// Invalid input (empty name, no importance) is reported through the diagnostics
    /// sink and nothing is written. Returns the marker that was published.
    pub fn add_event_marker(
        &self,
        name: &str,
        description: Option<&str>,
        importance: Option<EventImportance>,
    ) -> Option<EventMarker> {
        let marker = match EventMarker::validate(name, description, importance, self.clock.now())
        {
            Ok(marker) => marker,
            Err(e) => {
                self.diagnostics.report_error(&e.to_string());
                return None;
            }
        };

        let path = join_path(&join_path(&self.key(EVENTS_TABLE), &marker.name), "Info");
        self.write(&path, marker.info());
        debug!(
            target: "shuffleboard",
            name = %marker.name,
            importance = %marker.importance,
            "Event marker published"
        );
        Some(marker)
    }
}
