//! Event markers: discrete, severity-tagged notes injected into the recording stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::namespace::Value;

/// Severity of an event, ordered from trivial to critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventImportance {
    Trivial,
    Low,
    Normal,
    High,
    Critical,
}

impl EventImportance {
    pub const ALL: [EventImportance; 5] = [
        EventImportance::Trivial,
        EventImportance::Low,
        EventImportance::Normal,
        EventImportance::High,
        EventImportance::Critical,
    ];

    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EventImportance::Trivial => "TRIVIAL",
            EventImportance::Low => "LOW",
            EventImportance::Normal => "NORMAL",
            EventImportance::High => "HIGH",
            EventImportance::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for EventImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventImportance {
    type Err = EventMarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventImportance::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EventMarkerError::UnknownImportance(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventMarkerError {
    #[error("Shuffleboard event name was not specified")]
    MissingName,

    #[error("Shuffleboard event importance was not specified")]
    MissingImportance,

    #[error("Unknown event importance: {0}")]
    UnknownImportance(String),

    #[error("Malformed event info: {0}")]
    MalformedInfo(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMarker {
    pub name: String,
    pub description: String,
    pub importance: EventImportance,
    pub timestamp: DateTime<Utc>,
}

impl EventMarker {
    /// Validate caller input; a missing description becomes the empty string
    pub fn validate(
        name: &str,
        description: Option<&str>,
        importance: Option<EventImportance>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventMarkerError> {
        if name.is_empty() {
            return Err(EventMarkerError::MissingName);
        }
        let importance = importance.ok_or(EventMarkerError::MissingImportance)?;
        Ok(Self {
            name: name.to_string(),
            description: description.unwrap_or_default().to_string(),
            importance,
            timestamp,
        })
    }

    /// `[description, importance, timestamp]` as published under `events/<name>/Info`
    pub fn info(&self) -> Value {
        Value::StringArray(vec![
            self.description.clone(),
            self.importance.as_str().to_string(),
            self.timestamp.to_rfc3339(),
        ])
    }

    /// Rebuild a marker from its published info; the timestamp falls back to `observed`
    pub fn from_info(
        name: &str,
        info: &[String],
        observed: DateTime<Utc>,
    ) -> Result<Self, EventMarkerError> {
        let (description, importance) = match info {
            [description, importance, ..] => (description, importance.parse::<EventImportance>()?),
            _ => return Err(EventMarkerError::MalformedInfo(name.to_string())),
        };
        let timestamp = info
            .get(2)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(observed);
        Ok(Self {
            name: name.to_string(),
            description: description.clone(),
            importance,
            timestamp,
        })
    }
}
