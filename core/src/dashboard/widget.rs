// Widgets: named display bindings under a tab or layout

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::tree::NodeId;
use super::Shared;
use crate::namespace::{Entry, Value};

/// Pulls a widget's current value on every update.
///
/// Suppliers run while the dashboard tree is locked and must not call back into it.
pub type Supplier = Arc<dyn Fn() -> Value + Send + Sync>;

/// A complex object displayed by one widget: a motor controller, a PID loop, a chooser.
///
/// The dashboard writes `type_name` once and each property whenever its value changes.
/// Implementations are polled while the dashboard tree is locked and must not call back
/// into it.
pub trait Sendable: Send + Sync {
    fn type_name(&self) -> String;

    /// Actuators only accept remote control while actuator widgets are enabled
    fn is_actuator(&self) -> bool {
        false
    }

    fn properties(&self) -> Vec<(String, Value)>;
}

/// Handle to a widget node.
///
/// Builder methods take and return the handle; every copy refers to the same node, and
/// changes reach the namespace on the next update.
#[derive(Clone)]
pub struct Widget {
    shared: Arc<Shared>,
    id: NodeId,
}

impl Widget {
    pub(crate) fn new(shared: Arc<Shared>, id: NodeId) -> Self {
        Self { shared, id }
    }

    pub fn title(&self) -> String {
        self.shared.lock().node(self.id).title.clone()
    }

    pub fn path(&self) -> String {
        self.shared.path(self.id)
    }

    /// The value slot this widget displays
    pub fn entry(&self) -> Entry {
        Entry::new(Arc::clone(&self.shared.namespace), self.path())
    }

    pub fn widget_type(&self) -> Option<String> {
        self.shared.lock().node(self.id).meta.widget_type.clone()
    }

    /// Display with a specific widget, e.g. "Toggle Button"
    pub fn with_widget(self, widget_type: impl Into<String>) -> Self {
        self.shared.edit_meta(self.id, |meta| meta.widget_type = Some(widget_type.into()));
        self
    }

    /// Replace the widget's custom properties
    pub fn with_properties<I, K, V>(self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let properties: BTreeMap<String, Value> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.shared.edit_meta(self.id, move |meta| meta.properties = properties);
        self
    }

    /// Size in grid cells
    pub fn with_size(self, width: u32, height: u32) -> Self {
        self.shared.edit_meta(self.id, |meta| meta.size = Some((width, height)));
        self
    }

    /// Position in grid cells, zero-based
    pub fn with_position(self, column: u32, row: u32) -> Self {
        self.shared.edit_meta(self.id, |meta| meta.position = Some((column, row)));
        self
    }

    /// Two handles are equal when they refer to the same node of the same dashboard
    pub fn same_node(&self, other: &Widget) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.id == other.id
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}
