//! Shared key-value namespace contract.
//!
//! The dashboard and the recording controller only ever talk to the remote client
//! through a [`Namespace`]: a hierarchical mapping from slash-joined paths to typed
//! values with change notification. The transport behind it is out of scope;
//! [`InMemoryNamespace`] is the reference implementation used by tests and the demo.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub const PATH_SEPARATOR: char = '/';

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A typed value stored under one namespace key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Double(f64),
    String(String),
    Raw(Vec<u8>),
    BooleanArray(Vec<bool>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Raw(_) => "raw",
            Value::BooleanArray(_) => "boolean[]",
            Value::DoubleArray(_) => "double[]",
            Value::StringArray(_) => "string[]",
        }
    }

    fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Change detection: like `==`, but doubles compare by bit pattern so NaN equals itself
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::DoubleArray(a), Value::DoubleArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => self == other,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::BooleanArray(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleArray(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NamespaceError {
    #[error("Namespace unavailable")]
    Unavailable,

    #[error("Type mismatch at {path}: entry holds {existing}, write was {attempted}")]
    TypeMismatch {
        path: String,
        existing: &'static str,
        attempted: &'static str,
    },
}

/// What happened to a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Set(Value),
    Deleted,
}

/// Change notification delivered to namespace subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct EntryNotification {
    pub path: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}

/// Contract the dashboard requires from the shared namespace.
///
/// Writes are ordered per key. A write that leaves the stored value unchanged is not
/// observable: no notification is sent for it.
#[cfg_attr(test, mockall::automock)]
pub trait Namespace: Send + Sync {
    /// Point write
    fn set(&self, path: &str, value: Value) -> Result<(), NamespaceError>;

    /// Write only when the key is absent; returns whether a write happened
    fn set_default(&self, path: &str, value: Value) -> Result<bool, NamespaceError>;

    fn get(&self, path: &str) -> Option<Value>;

    fn delete(&self, path: &str) -> Result<(), NamespaceError>;

    /// Bulk enumeration of every key under `prefix`, sorted by path
    fn entries(&self, prefix: &str) -> Vec<(String, Value)>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<EntryNotification>;
}

/// Join a child title onto a parent path. Titles are used as-is, empty ones included.
pub fn join_path(parent: &str, child: &str) -> String {
    format!("{}{}{}", parent, PATH_SEPARATOR, child)
}

/// In-memory namespace backed by DashMap, with broadcast change notification.
pub struct InMemoryNamespace {
    entries: DashMap<String, Value>,
    notifier: broadcast::Sender<EntryNotification>,
    online: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryNamespace {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a namespace whose notification channel buffers `capacity` changes
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (notifier, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            entries: DashMap::new(),
            notifier,
            online: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        })
    }

    /// Simulate the transport going away (or coming back)
    pub fn set_online(&self, online: bool) {
        debug!(online, "Namespace availability changed");
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of observable writes (value changes and deletions) so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_online(&self) -> Result<(), NamespaceError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(NamespaceError::Unavailable)
        }
    }

    fn notify(&self, path: &str, kind: NotificationKind) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        trace!(path, "Namespace entry changed");
        // Ignore error if no subscribers
        let _ = self.notifier.send(EntryNotification {
            path: path.to_string(),
            kind,
            timestamp: Utc::now(),
        });
    }
}

impl Namespace for InMemoryNamespace {
    fn set(&self, path: &str, value: Value) -> Result<(), NamespaceError> {
        self.ensure_online()?;

        let changed = match self.entries.entry(path.to_string()) {
            MapEntry::Occupied(mut slot) => {
                if !slot.get().same_type(&value) {
                    return Err(NamespaceError::TypeMismatch {
                        path: path.to_string(),
                        existing: slot.get().type_name(),
                        attempted: value.type_name(),
                    });
                }
                if slot.get().same_value(&value) {
                    false
                } else {
                    slot.insert(value.clone());
                    true
                }
            }
            MapEntry::Vacant(slot) => {
                slot.insert(value.clone());
                true
            }
        };

        if changed {
            self.notify(path, NotificationKind::Set(value));
        }
        Ok(())
    }

    fn set_default(&self, path: &str, value: Value) -> Result<bool, NamespaceError> {
        self.ensure_online()?;

        let inserted = match self.entries.entry(path.to_string()) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(slot) => {
                slot.insert(value.clone());
                true
            }
        };

        if inserted {
            self.notify(path, NotificationKind::Set(value));
        }
        Ok(inserted)
    }

    fn get(&self, path: &str) -> Option<Value> {
        self.entries.get(path).map(|v| v.clone())
    }

    fn delete(&self, path: &str) -> Result<(), NamespaceError> {
        self.ensure_online()?;
        if self.entries.remove(path).is_some() {
            self.notify(path, NotificationKind::Deleted);
        }
        Ok(())
    }

    fn entries(&self, prefix: &str) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn subscribe(&self) -> broadcast::Receiver<EntryNotification> {
        self.notifier.subscribe()
    }
}

/// Handle to a single key of a namespace: the caller-visible value slot of a widget
#[derive(Clone)]
pub struct Entry {
    namespace: Arc<dyn Namespace>,
    path: String,
}

impl Entry {
    pub fn new(namespace: Arc<dyn Namespace>, path: impl Into<String>) -> Self {
        Self {
            namespace,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self) -> Option<Value> {
        self.namespace.get(&self.path)
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<(), NamespaceError> {
        self.namespace.set(&self.path, value.into())
    }

    pub fn set_default(&self, value: impl Into<Value>) -> Result<bool, NamespaceError> {
        self.namespace.set_default(&self.path, value.into())
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_write_is_not_observable() {
        let ns = InMemoryNamespace::new();
        ns.set("/a", Value::Double(1.0)).unwrap();
        ns.set("/a", Value::Double(1.0)).unwrap();
        assert_eq!(ns.write_count(), 1);

        ns.set("/a", Value::Double(2.0)).unwrap();
        assert_eq!(ns.write_count(), 2);
    }

    #[test]
    fn nan_rewrite_is_not_observable() {
        let ns = InMemoryNamespace::new();
        ns.set("/nan", Value::Double(f64::NAN)).unwrap();
        ns.set("/nan", Value::Double(f64::NAN)).unwrap();
        ns.set("/arr", Value::DoubleArray(vec![1.0, f64::NAN])).unwrap();
        ns.set("/arr", Value::DoubleArray(vec![1.0, f64::NAN])).unwrap();
        assert_eq!(ns.write_count(), 2);

        assert!(Value::Double(f64::NAN).same_value(&Value::Double(f64::NAN)));
        assert!(!Value::Double(1.0).same_value(&Value::Double(2.0)));
        assert!(!Value::DoubleArray(vec![1.0]).same_value(&Value::DoubleArray(vec![1.0, 2.0])));
    }

    #[test]
    fn keys_keep_their_first_type() {
        let ns = InMemoryNamespace::new();
        ns.set("/a", Value::Boolean(true)).unwrap();
        let err = ns.set("/a", Value::from("nope")).unwrap_err();
        assert!(matches!(err, NamespaceError::TypeMismatch { .. }));
        assert_eq!(ns.get("/a"), Some(Value::Boolean(true)));
    }

    #[test]
    fn set_default_only_writes_absent_keys() {
        let ns = InMemoryNamespace::new();
        assert!(ns.set_default("/a", Value::Double(1.0)).unwrap());
        assert!(!ns.set_default("/a", Value::Double(5.0)).unwrap());
        assert_eq!(ns.get("/a"), Some(Value::Double(1.0)));
    }

    #[test]
    fn offline_namespace_rejects_writes() {
        let ns = InMemoryNamespace::new();
        ns.set_online(false);
        assert_eq!(
            ns.set("/a", Value::Double(1.0)),
            Err(NamespaceError::Unavailable)
        );
        assert!(ns.is_empty());

        ns.set_online(true);
        assert!(ns.set("/a", Value::Double(1.0)).is_ok());
    }

    #[test]
    fn entries_are_filtered_and_sorted() {
        let ns = InMemoryNamespace::new();
        ns.set("/b/2", Value::Double(2.0)).unwrap();
        ns.set("/b/1", Value::Double(1.0)).unwrap();
        ns.set("/c", Value::Double(3.0)).unwrap();

        let keys: Vec<String> = ns.entries("/b/").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/b/1".to_string(), "/b/2".to_string()]);
    }

    #[test]
    fn subscribers_see_sets_and_deletes() {
        let ns = InMemoryNamespace::new();
        let mut rx = ns.subscribe();

        ns.set("/a", Value::from("x")).unwrap();
        ns.delete("/a").unwrap();
        ns.delete("/a").unwrap();

        let first = rx.try_recv().expect("set notification");
        assert_eq!(first.kind, NotificationKind::Set(Value::from("x")));
        let second = rx.try_recv().expect("delete notification");
        assert_eq!(second.kind, NotificationKind::Deleted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn join_path_keeps_empty_titles() {
        assert_eq!(join_path("/Shuffleboard", "Tab"), "/Shuffleboard/Tab");
        assert_eq!(join_path("/Shuffleboard", ""), "/Shuffleboard/");
        assert_eq!(join_path(&join_path("/Shuffleboard", ""), "x"), "/Shuffleboard//x");
    }
}
