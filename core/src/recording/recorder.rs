//! Reference recorder: persists the namespace stream into `.sbr` files.
//!
//! This plays the part of the remote client. It watches the recording control keys and,
//! while `RecordData` is true, appends one JSON record per line:
//! - `session_start` with the resolved file name
//! - `value` / `deleted` for every dashboard change outside `.recording/`
//! - `event` for each published event marker
//! - `session_end` when recording stops

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::controller::{resolve_file_name, DEFAULT_FILE_NAME_FORMAT};
use super::event::{EventImportance, EventMarker};
use super::{EVENTS_TABLE, FILE_NAME_KEY, RECORDING_TABLE, RECORD_DATA_KEY};
use crate::dashboard::BASE_TABLE_NAME;
use crate::namespace::{join_path, EntryNotification, Namespace, NotificationKind, Value};

pub const RECORDING_FILE_EXTENSION: &str = "sbr";

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One line of a recording file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordEntry {
    SessionStart {
        file_name: String,
        timestamp: DateTime<Utc>,
    },
    Value {
        path: String,
        value: Value,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        path: String,
        timestamp: DateTime<Utc>,
    },
    Event {
        name: String,
        description: String,
        importance: EventImportance,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        timestamp: DateTime<Utc>,
    },
}

struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

pub struct Recorder {
    dir: PathBuf,
    // Base table plus separator, so sibling tables sharing the prefix are ignored
    base_prefix: String,
    recording_table: String,
    snapshot_source: Option<Arc<dyn Namespace>>,
    file_name: Option<String>,
    open: Option<OpenFile>,
    finished: Vec<PathBuf>,
}

impl Recorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_base_table(dir, BASE_TABLE_NAME)
    }

    pub fn with_base_table(dir: impl Into<PathBuf>, base_table: &str) -> Self {
        Self {
            dir: dir.into(),
            base_prefix: join_path(base_table, ""),
            recording_table: join_path(base_table, RECORDING_TABLE),
            snapshot_source: None,
            file_name: None,
            open: None,
            finished: Vec::new(),
        }
    }

    /// Write every existing dashboard value at session start, read from `namespace`
    pub fn with_snapshot(mut self, namespace: Arc<dyn Namespace>) -> Self {
        self.snapshot_source = Some(namespace);
        self
    }

    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.open.as_ref().map(|f| f.path.as_path())
    }

    /// Files closed so far, oldest first
    pub fn finished_files(&self) -> &[PathBuf] {
        &self.finished
    }

    /// Apply one namespace change
    pub fn handle(&mut self, notification: &EntryNotification) -> Result<(), RecorderError> {
        let path = notification.path.as_str();
        let timestamp = notification.timestamp;

        if let Some(control) = path
            .strip_prefix(self.recording_table.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            return self.handle_control(control, &notification.kind, timestamp);
        }

        if !path.starts_with(self.base_prefix.as_str()) || self.open.is_none() {
            return Ok(());
        }

        let entry = match &notification.kind {
            NotificationKind::Set(value) => RecordEntry::Value {
                path: path.to_string(),
                value: value.clone(),
                timestamp,
            },
            NotificationKind::Deleted => RecordEntry::Deleted {
                path: path.to_string(),
                timestamp,
            },
        };
        self.append(&entry)
    }

    fn handle_control(
        &mut self,
        control: &str,
        kind: &NotificationKind,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RecorderError> {
        match (control, kind) {
            (FILE_NAME_KEY, NotificationKind::Set(Value::String(name))) => {
                self.file_name = Some(name.clone());
                Ok(())
            }
            (RECORD_DATA_KEY, NotificationKind::Set(Value::Boolean(true))) => {
                self.start_session(timestamp)
            }
            (RECORD_DATA_KEY, NotificationKind::Set(Value::Boolean(false)))
            | (RECORD_DATA_KEY, NotificationKind::Deleted) => self.end_session(timestamp),
            (other, NotificationKind::Set(Value::StringArray(info))) => {
                let Some(name) = other
                    .strip_prefix(EVENTS_TABLE)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .and_then(|rest| rest.strip_suffix("/Info"))
                else {
                    return Ok(());
                };
                if self.open.is_none() {
                    return Ok(());
                }
                match EventMarker::from_info(name, info, timestamp) {
                    Ok(marker) => self.append(&RecordEntry::Event {
                        name: marker.name,
                        description: marker.description,
                        importance: marker.importance,
                        timestamp: marker.timestamp,
                    }),
                    Err(e) => {
                        warn!(target: "shuffleboard::recorder", error = %e, "Skipping event marker");
                        Ok(())
                    }
                }
            }
            _ => Ok(()),
        }
    }

    fn start_session(&mut self, timestamp: DateTime<Utc>) -> Result<(), RecorderError> {
        if self.open.is_some() {
            return Ok(());
        }
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| resolve_file_name(DEFAULT_FILE_NAME_FORMAT, timestamp));
        if !is_relative_file_name(&file_name) {
            warn!(
                target: "shuffleboard::recorder",
                file_name = %file_name,
                "Refusing recording file name outside the recording directory; session skipped"
            );
            return Ok(());
        }

        let (path, file) = self.create_session_file(&file_name)?;
        let writer = BufWriter::new(file);
        info!(target: "shuffleboard::recorder", file = %path.display(), "Recording file opened");
        self.open = Some(OpenFile { path, writer });

        self.append(&RecordEntry::SessionStart {
            file_name,
            timestamp,
        })?;

        if let Some(source) = self.snapshot_source.clone() {
            for (path, value) in source.entries(&self.base_prefix) {
                if path.starts_with(self.recording_table.as_str()) {
                    continue;
                }
                self.append(&RecordEntry::Value {
                    path,
                    value,
                    timestamp,
                })?;
            }
        }
        Ok(())
    }

    /// Create `<dir>/<name>.sbr`, or `<name>-N.sbr` when earlier sessions already used the name
    fn create_session_file(&self, file_name: &str) -> Result<(PathBuf, File), RecorderError> {
        let mut suffix = 0u32;
        loop {
            let stem = if suffix == 0 {
                file_name.to_string()
            } else {
                format!("{}-{}", file_name, suffix)
            };
            let path = self
                .dir
                .join(format!("{}.{}", stem, RECORDING_FILE_EXTENSION));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn end_session(&mut self, timestamp: DateTime<Utc>) -> Result<(), RecorderError> {
        if self.open.is_none() {
            return Ok(());
        }
        self.append(&RecordEntry::SessionEnd { timestamp })?;
        if let Some(mut file) = self.open.take() {
            file.writer.flush()?;
            info!(target: "shuffleboard::recorder", file = %file.path.display(), "Recording file closed");
            self.finished.push(file.path);
        }
        Ok(())
    }

    fn append(&mut self, entry: &RecordEntry) -> Result<(), RecorderError> {
        if let Some(file) = self.open.as_mut() {
            serde_json::to_writer(&mut file.writer, entry)?;
            file.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Close any open session, e.g. on shutdown
    pub fn finish(&mut self) -> Result<(), RecorderError> {
        self.end_session(Utc::now())
    }

    /// Consume notifications on a tokio task until the namespace goes away
    pub fn spawn(mut self, mut rx: broadcast::Receiver<EntryNotification>) -> JoinHandle<Self> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(notification) => {
                        if let Err(e) = self.handle(&notification) {
                            warn!(target: "shuffleboard::recorder", error = %e, path = %notification.path, "Failed to record change");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "shuffleboard::recorder", skipped, "Recorder lagged; changes were dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!(target: "shuffleboard::recorder", "Namespace closed");
                        break;
                    }
                }
            }
            if let Err(e) = self.finish() {
                warn!(target: "shuffleboard::recorder", error = %e, "Failed to close recording");
            }
            self
        })
    }
}

/// Names coming from the namespace may only point below the recording directory
fn is_relative_file_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Read a recording file back into its records
pub fn read_recording(path: impl AsRef<Path>) -> Result<Vec<RecordEntry>, RecorderError> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_must_stay_below_the_directory() {
        assert!(is_relative_file_name("recording-2024-03-09"));
        assert!(is_relative_file_name("practice/run-1"));
        assert!(!is_relative_file_name(""));
        assert!(!is_relative_file_name("/tmp/evil"));
        assert!(!is_relative_file_name("../evil"));
        assert!(!is_relative_file_name("runs/../../evil"));
        assert!(!is_relative_file_name("./here"));
    }
}
