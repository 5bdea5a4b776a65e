// Recording module - session control, event markers and the reference file recorder

mod controller;
mod event;
pub mod recorder;

pub use controller::{
    resolve_file_name, Clock, RecordingController, RecordingSession, RecordingState,
    SystemClock, DATE_PLACEHOLDER, DEFAULT_FILE_NAME_FORMAT, TIME_PLACEHOLDER,
};
pub use event::{EventImportance, EventMarker, EventMarkerError};
pub use recorder::{read_recording, RecordEntry, Recorder, RecorderError};

/// Control table under the dashboard base table
pub const RECORDING_TABLE: &str = ".recording";
pub const RECORD_DATA_KEY: &str = "RecordData";
pub const FILE_NAME_FORMAT_KEY: &str = "FileNameFormat";
pub const FILE_NAME_KEY: &str = "FileName";
pub const EVENTS_TABLE: &str = "events";
