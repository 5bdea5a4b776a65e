// Shuffleboard Core Library
// Live dashboard tree and recording control over a shared key-value namespace

pub mod config;
pub mod dashboard;
pub mod diagnostics;
pub mod namespace;
pub mod recording;
pub mod shuffleboard;
pub mod telemetry;

// Export core types
pub use config::ShuffleboardConfig;
pub use dashboard::{
    DashboardError, Layout, Sendable, ShuffleboardRoot, Supplier, Tab, Widget, BASE_TABLE_NAME,
};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, DiagnosticSink, TracingDiagnostics};
pub use namespace::{
    Entry, EntryNotification, InMemoryNamespace, Namespace, NamespaceError, NotificationKind, Value,
};
pub use recording::{
    read_recording, Clock, EventImportance, EventMarker, EventMarkerError, RecordEntry, Recorder,
    RecorderError, RecordingController, RecordingSession, RecordingState, SystemClock,
};
pub use shuffleboard::Shuffleboard;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShuffleboardError {
    #[error("Namespace error: {0}")]
    Namespace(#[from] NamespaceError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] DashboardError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, ShuffleboardError>;
