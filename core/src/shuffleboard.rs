//! Caller-facing facade.
//!
//! One [`Shuffleboard`] owns the dashboard root and the recording controller for a
//! namespace. Construct it once at startup and hand it to the control loop:
//!
//! ```
//! use shuffleboard_core::{EventImportance, InMemoryNamespace, Shuffleboard};
//!
//! let board = Shuffleboard::new(InMemoryNamespace::new());
//! let toggle = board
//!     .get_tab("Example Tab")
//!     .get_layout("List", "Example List")
//!     .unwrap()
//!     .add("My Boolean", false)
//!     .unwrap()
//!     .with_widget("Toggle Button")
//!     .entry();
//!
//! board.start_recording();
//! board.add_event_marker("Match start", None, Some(EventImportance::Normal));
//! board.update();
//! assert_eq!(toggle.path(), "/Shuffleboard/Example Tab/Example List/My Boolean");
//! ```

use std::sync::Arc;

use crate::config::ShuffleboardConfig;
use crate::dashboard::{ShuffleboardRoot, Tab};
use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::namespace::Namespace;
use crate::recording::{Clock, EventImportance, EventMarker, RecordingController, RecordingState};

pub struct Shuffleboard {
    root: ShuffleboardRoot,
    recording: RecordingController,
}

impl Shuffleboard {
    pub fn new(namespace: Arc<dyn Namespace>) -> Self {
        Self::with_diagnostics(namespace, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        namespace: Arc<dyn Namespace>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self::from_config(&ShuffleboardConfig::default(), namespace, diagnostics)
    }

    pub fn from_config(
        config: &ShuffleboardConfig,
        namespace: Arc<dyn Namespace>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let root = ShuffleboardRoot::with_base_table(
            Arc::clone(&namespace),
            Arc::clone(&diagnostics),
            config.base_table.clone(),
        );
        let recording = RecordingController::new(namespace, diagnostics)
            .with_base_table(&config.base_table)
            .with_default_format(config.default_file_name_format.clone());
        Self { root, recording }
    }

    /// Replace the clock used for session start and event timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.recording = self.recording.with_clock(clock);
        self
    }

    pub fn root(&self) -> &ShuffleboardRoot {
        &self.root
    }

    pub fn recording(&self) -> &RecordingController {
        &self.recording
    }

    /// Push every pending dashboard change. Call once per loop iteration.
    pub fn update(&self) {
        self.root.update();
    }

    pub fn get_tab(&self, title: &str) -> Tab {
        self.root.get_tab(title)
    }

    pub fn select_tab(&self, title: &str) {
        self.root.select_tab(title);
    }

    pub fn select_tab_index(&self, index: usize) {
        self.root.select_tab_index(index);
    }

    /// Enable remote control of actuator widgets (test mode)
    pub fn enable_actuator_widgets(&self) {
        self.root.enable_actuator_widgets();
    }

    /// Disable remote control of actuator widgets, after a full update
    pub fn disable_actuator_widgets(&self) {
        self.root.disable_actuator_widgets();
    }

    pub fn start_recording(&self) {
        self.recording.start_recording();
    }

    pub fn stop_recording(&self) {
        self.recording.stop_recording();
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording.state()
    }

    pub fn set_recording_file_name_format(&self, format: impl Into<String>) {
        self.recording.set_recording_file_name_format(format);
    }

    pub fn clear_recording_file_name_format(&self) {
        self.recording.clear_recording_file_name_format();
    }

    pub fn add_event_marker(
        &self,
        name: &str,
        description: Option<&str>,
        importance: Option<EventImportance>,
    ) -> Option<EventMarker> {
        self.recording.add_event_marker(name, description, importance)
    }
}
