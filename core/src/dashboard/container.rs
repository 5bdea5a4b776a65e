// Tabs and layouts: the container nodes of the dashboard tree

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::tree::{NodeId, NodeKind};
use super::widget::{Sendable, Widget};
use super::{DashboardError, Shared};
use crate::namespace::Value;

/// Top-level dashboard tab
#[derive(Clone)]
pub struct Tab {
    shared: Arc<Shared>,
    id: NodeId,
}

impl Tab {
    pub(crate) fn new(shared: Arc<Shared>, id: NodeId) -> Self {
        Self { shared, id }
    }

    pub fn title(&self) -> String {
        self.shared.lock().node(self.id).title.clone()
    }

    pub fn path(&self) -> String {
        self.shared.path(self.id)
    }

    pub fn actuators_enabled(&self) -> bool {
        match self.shared.lock().node(self.id).kind {
            NodeKind::Tab { actuators_enabled } => actuators_enabled,
            _ => false,
        }
    }

    /// Titles of the direct children, in creation order
    pub fn children(&self) -> Vec<String> {
        self.shared.lock().child_titles(self.id)
    }

    /// Find or create a layout in this tab. The type must always be given; a layout
    /// keeps the type it was created with.
    pub fn get_layout(&self, layout_type: &str, title: &str) -> Result<Layout, DashboardError> {
        let id = self.shared.get_or_create_layout(self.id, layout_type, title)?;
        Ok(Layout::new(Arc::clone(&self.shared), id))
    }

    /// Add a widget bound to `<tab path>/<title>`; re-adding a title replaces its value
    pub fn add(&self, title: &str, value: impl Into<Value>) -> Result<Widget, DashboardError> {
        let id = self.shared.add_simple(self.id, title, value.into())?;
        Ok(Widget::new(Arc::clone(&self.shared), id))
    }

    /// Add a widget whose value is pulled from `supplier` on every update
    pub fn add_supplied<F>(&self, title: &str, supplier: F) -> Result<Widget, DashboardError>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let id = self.shared.add_supplied(self.id, title, Arc::new(supplier))?;
        Ok(Widget::new(Arc::clone(&self.shared), id))
    }

    pub fn add_sendable(
        &self,
        title: &str,
        sendable: Arc<dyn Sendable>,
    ) -> Result<Widget, DashboardError> {
        let id = self.shared.add_complex(self.id, title, sendable)?;
        Ok(Widget::new(Arc::clone(&self.shared), id))
    }

    pub fn same_node(&self, other: &Tab) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.id == other.id
    }
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("title", &self.title())
            .finish()
    }
}

/// A typed container ("List", "Grid", ...) nested in a tab or another layout
#[derive(Clone)]
pub struct Layout {
    shared: Arc<Shared>,
    id: NodeId,
}

impl Layout {
    pub(crate) fn new(shared: Arc<Shared>, id: NodeId) -> Self {
        Self { shared, id }
    }

    pub fn title(&self) -> String {
        self.shared.lock().node(self.id).title.clone()
    }

    pub fn path(&self) -> String {
        self.shared.path(self.id)
    }

    pub fn layout_type(&self) -> String {
        match &self.shared.lock().node(self.id).kind {
            NodeKind::Layout { layout_type } => layout_type.clone(),
            _ => String::new(),
        }
    }

    pub fn children(&self) -> Vec<String> {
        self.shared.lock().child_titles(self.id)
    }

    pub fn get_layout(&self, layout_type: &str, title: &str) -> Result<Layout, DashboardError> {
        let id = self.shared.get_or_create_layout(self.id, layout_type, title)?;
        Ok(Layout::new(Arc::clone(&self.shared), id))
    }

    pub fn add(&self, title: &str, value: impl Into<Value>) -> Result<Widget, DashboardError> {
        let id = self.shared.add_simple(self.id, title, value.into())?;
        Ok(Widget::new(Arc::clone(&self.shared), id))
    }

    pub fn add_supplied<F>(&self, title: &str, supplier: F) -> Result<Widget, DashboardError>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let id = self.shared.add_supplied(self.id, title, Arc::new(supplier))?;
        Ok(Widget::new(Arc::clone(&self.shared), id))
    }

    pub fn add_sendable(
        &self,
        title: &str,
        sendable: Arc<dyn Sendable>,
    ) -> Result<Widget, DashboardError> {
        let id = self.shared.add_complex(self.id, title, sendable)?;
        Ok(Widget::new(Arc::clone(&self.shared), id))
    }

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

    pub fn with_size(self, width: u32, height: u32) -> Self {
        self.shared.edit_meta(self.id, |meta| meta.size = Some((width, height)));
        self
    }

    pub fn with_position(self, column: u32, row: u32) -> Self {
        self.shared.edit_meta(self.id, |meta| meta.position = Some((column, row)));
        self
    }

    pub fn same_node(&self, other: &Layout) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.id == other.id
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}
