// Arena-backed dashboard tree
//
// Nodes are created under a parent and never reparented or removed, so a node id stays
// valid for the life of the tree and parent links can't form cycles.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::widget::{Sendable, Supplier};
use super::{DashboardError, METADATA_TABLE, TYPE_KEY};
use crate::namespace::{join_path, Value};

pub(crate) type NodeId = usize;

pub(crate) const TAB_TYPE: &str = "ShuffleboardTab";
pub(crate) const LAYOUT_TYPE: &str = "ShuffleboardLayout";
pub(crate) const CONTROLLABLE_KEY: &str = ".controllable";

/// A pending change to the namespace
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Write {
    Set(String, Value),
    /// Write only if the remote side holds no value yet
    SetDefault(String, Value),
    Delete(String),
}

/// Display metadata shared by widgets and layouts
#[derive(Debug, Default)]
pub(crate) struct Metadata {
    pub widget_type: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub size: Option<(u32, u32)>,
    pub position: Option<(u32, u32)>,
    pub dirty: bool,
    published_properties: BTreeSet<String>,
}

impl Metadata {
    fn flush(&mut self, meta_path: &str, writes: &mut Vec<Write>) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        if let Some(widget_type) = &self.widget_type {
            writes.push(Write::Set(
                join_path(meta_path, "PreferredComponent"),
                Value::String(widget_type.clone()),
            ));
        }
        if let Some((width, height)) = self.size {
            writes.push(Write::Set(
                join_path(meta_path, "Size"),
                Value::DoubleArray(vec![width as f64, height as f64]),
            ));
        }
        if let Some((column, row)) = self.position {
            writes.push(Write::Set(
                join_path(meta_path, "Position"),
                Value::DoubleArray(vec![column as f64, row as f64]),
            ));
        }

        let props_path = join_path(meta_path, "Properties");
        for stale in self.published_properties.difference(&self.properties.keys().cloned().collect()) {
            writes.push(Write::Delete(join_path(&props_path, stale)));
        }
        for (key, value) in &self.properties {
            writes.push(Write::Set(join_path(&props_path, key), value.clone()));
        }
        self.published_properties = self.properties.keys().cloned().collect();
    }
}

pub(crate) enum NodeKind {
    Tab {
        actuators_enabled: bool,
    },
    Layout {
        layout_type: String,
    },
    Simple {
        pending: Option<Value>,
    },
    Supplied {
        supplier: Supplier,
        last: Option<Value>,
    },
    Complex {
        sendable: Arc<dyn Sendable>,
        last: HashMap<String, Value>,
        controllable: Option<bool>,
    },
}

impl NodeKind {
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Tab { .. } => "tab",
            NodeKind::Layout { .. } => "layout",
            NodeKind::Simple { .. } => "widget",
            NodeKind::Supplied { .. } => "supplied widget",
            NodeKind::Complex { .. } => "complex widget",
        }
    }
}

pub(crate) struct Node {
    pub title: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    pub meta: Metadata,
    pub built: bool,
}

#[derive(Default)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
    tabs: Vec<NodeId>,
    // (parent, title) -> node; tabs use parent None
    index: HashMap<(Option<NodeId>, String), NodeId>,
    tabs_dirty: bool,
    actuators_enabled: bool,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn actuators_enabled(&self) -> bool {
        self.actuators_enabled
    }

    pub fn tab_titles(&self) -> Vec<String> {
        self.tabs
            .iter()
            .map(|id| self.nodes[*id].title.clone())
            .collect()
    }

    pub fn child_titles(&self, id: NodeId) -> Vec<String> {
        self.nodes[id]
            .children
            .iter()
            .map(|c| self.nodes[*c].title.clone())
            .collect()
    }

    pub fn lookup(&self, parent: Option<NodeId>, title: &str) -> Option<NodeId> {
        self.index.get(&(parent, title.to_string())).copied()
    }

    fn insert(&mut self, parent: Option<NodeId>, title: &str, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            title: title.to_string(),
            parent,
            children: Vec::new(),
            kind,
            meta: Metadata::default(),
            built: false,
        });
        self.index.insert((parent, title.to_string()), id);
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => {
                self.tabs.push(id);
                self.tabs_dirty = true;
            }
        }
        id
    }

    pub fn get_or_create_tab(&mut self, title: &str) -> (NodeId, bool) {
        if let Some(id) = self.lookup(None, title) {
            return (id, false);
        }
        let actuators_enabled = self.actuators_enabled;
        (
            self.insert(None, title, NodeKind::Tab { actuators_enabled }),
            true,
        )
    }

    /// Find or create a layout; the type given at creation is kept for good.
    ///
    /// Returns the layout id and, when the caller asked for a different type than the
    /// recorded one, the recorded type.
    pub fn get_or_create_layout(
        &mut self,
        parent: NodeId,
        layout_type: &str,
        title: &str,
    ) -> Result<(NodeId, Option<String>), DashboardError> {
        if let Some(id) = self.lookup(Some(parent), title) {
            return match &self.nodes[id].kind {
                NodeKind::Layout { layout_type: existing } if existing == layout_type => {
                    Ok((id, None))
                }
                NodeKind::Layout { layout_type: existing } => Ok((id, Some(existing.clone()))),
                other => Err(self.conflict(parent, title, other.describe())),
            };
        }
        let id = self.insert(
            Some(parent),
            title,
            NodeKind::Layout {
                layout_type: layout_type.to_string(),
            },
        );
        Ok((id, None))
    }

    pub fn add_simple(
        &mut self,
        parent: NodeId,
        title: &str,
        value: Value,
    ) -> Result<NodeId, DashboardError> {
        if let Some(id) = self.lookup(Some(parent), title) {
            return match &mut self.nodes[id].kind {
                NodeKind::Simple { pending } => {
                    *pending = Some(value);
                    Ok(id)
                }
                other => {
                    let existing = other.describe();
                    Err(self.conflict(parent, title, existing))
                }
            };
        }
        Ok(self.insert(
            Some(parent),
            title,
            NodeKind::Simple {
                pending: Some(value),
            },
        ))
    }

    pub fn add_supplied(
        &mut self,
        parent: NodeId,
        title: &str,
        supplier: Supplier,
    ) -> Result<NodeId, DashboardError> {
        if let Some(id) = self.lookup(Some(parent), title) {
            return match &mut self.nodes[id].kind {
                NodeKind::Supplied { supplier: slot, .. } => {
                    *slot = supplier;
                    Ok(id)
                }
                other => {
                    let existing = other.describe();
                    Err(self.conflict(parent, title, existing))
                }
            };
        }
        Ok(self.insert(
            Some(parent),
            title,
            NodeKind::Supplied {
                supplier,
                last: None,
            },
        ))
    }

    pub fn add_complex(
        &mut self,
        parent: NodeId,
        title: &str,
        sendable: Arc<dyn Sendable>,
    ) -> Result<NodeId, DashboardError> {
        if let Some(id) = self.lookup(Some(parent), title) {
            let node = &mut self.nodes[id];
            return match &mut node.kind {
                NodeKind::Complex {
                    sendable: slot,
                    last,
                    controllable,
                } => {
                    *slot = sendable;
                    last.clear();
                    *controllable = None;
                    node.built = false;
                    Ok(id)
                }
                other => {
                    let existing = other.describe();
                    Err(self.conflict(parent, title, existing))
                }
            };
        }
        Ok(self.insert(
            Some(parent),
            title,
            NodeKind::Complex {
                sendable,
                last: HashMap::new(),
                controllable: None,
            },
        ))
    }

    fn conflict(&self, parent: NodeId, title: &str, existing: &'static str) -> DashboardError {
        DashboardError::TitleConflict {
            parent: self.segments(parent).join("/"),
            title: title.to_string(),
            existing,
        }
    }

    /// Titles from the owning tab down to `id`
    pub fn segments(&self, id: NodeId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let node = &self.nodes[c];
            segments.push(node.title.as_str());
            current = node.parent;
        }
        segments.reverse();
        segments
    }

    pub fn tab_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            current = parent;
        }
        current
    }

    pub fn path(&self, base: &str, id: NodeId) -> String {
        self.segments(id)
            .into_iter()
            .fold(base.to_string(), |acc, s| join_path(&acc, s))
    }

    pub fn meta_path(&self, base: &str, id: NodeId) -> String {
        self.segments(id)
            .into_iter()
            .fold(join_path(base, METADATA_TABLE), |acc, s| join_path(&acc, s))
    }

    /// Collect every pending change in the tree, clearing dirty state as it goes
    pub fn flush(&mut self, base: &str) -> Vec<Write> {
        let mut writes = Vec::new();
        if self.tabs_dirty {
            self.tabs_dirty = false;
            writes.push(Write::Set(
                join_path(&join_path(base, METADATA_TABLE), "Tabs"),
                Value::StringArray(self.tab_titles()),
            ));
        }
        let tabs = self.tabs.clone();
        for tab in tabs {
            self.flush_node(base, tab, &mut writes);
        }
        writes
    }

    fn flush_node(&mut self, base: &str, id: NodeId, writes: &mut Vec<Write>) {
        let path = self.path(base, id);
        let meta_path = self.meta_path(base, id);
        let actuators_enabled = match &self.nodes[self.tab_of(id)].kind {
            NodeKind::Tab { actuators_enabled } => *actuators_enabled,
            _ => self.actuators_enabled,
        };

        let node = &mut self.nodes[id];
        let first_build = !node.built;
        node.built = true;

        match &mut node.kind {
            NodeKind::Tab { .. } => {
                if first_build {
                    writes.push(Write::Set(join_path(&path, TYPE_KEY), TAB_TYPE.into()));
                }
            }
            NodeKind::Layout { layout_type } => {
                if first_build {
                    writes.push(Write::Set(join_path(&path, TYPE_KEY), LAYOUT_TYPE.into()));
                    writes.push(Write::Set(
                        join_path(&meta_path, "PreferredComponent"),
                        Value::String(layout_type.clone()),
                    ));
                }
            }
            NodeKind::Simple { pending } => {
                if let Some(value) = pending.take() {
                    if first_build {
                        writes.push(Write::SetDefault(path.clone(), value));
                    } else {
                        writes.push(Write::Set(path.clone(), value));
                    }
                }
            }
            NodeKind::Supplied { supplier, last } => {
                let value = (**supplier)();
                if !last.as_ref().is_some_and(|l| l.same_value(&value)) {
                    writes.push(Write::Set(path.clone(), value.clone()));
                    *last = Some(value);
                }
            }
            NodeKind::Complex {
                sendable,
                last,
                controllable,
            } => {
                if first_build {
                    writes.push(Write::Set(
                        join_path(&path, TYPE_KEY),
                        Value::String(sendable.type_name()),
                    ));
                }
                for (key, value) in sendable.properties() {
                    if !last.get(&key).is_some_and(|l| l.same_value(&value)) {
                        writes.push(Write::Set(join_path(&path, &key), value.clone()));
                        last.insert(key, value);
                    }
                }
                if sendable.is_actuator() && *controllable != Some(actuators_enabled) {
                    writes.push(Write::Set(
                        join_path(&path, CONTROLLABLE_KEY),
                        Value::Boolean(actuators_enabled),
                    ));
                    *controllable = Some(actuators_enabled);
                }
            }
        }

        node.meta.flush(&meta_path, writes);

        let children = node.children.clone();
        for child in children {
            self.flush_node(base, child, writes);
        }
    }

    /// Flip the actuator flag on every tab and on already-built actuator widgets.
    ///
    /// Widgets not built yet pick the flag up on their first flush.
    pub fn set_actuators(&mut self, base: &str, enabled: bool) -> Vec<Write> {
        self.actuators_enabled = enabled;
        for tab in self.tabs.clone() {
            if let NodeKind::Tab { actuators_enabled } = &mut self.nodes[tab].kind {
                *actuators_enabled = enabled;
            }
        }

        let mut writes = Vec::new();
        for id in 0..self.nodes.len() {
            let built = self.nodes[id].built;
            let is_pending_actuator = matches!(
                &self.nodes[id].kind,
                NodeKind::Complex { sendable, controllable, .. }
                    if built && sendable.is_actuator() && *controllable != Some(enabled)
            );
            if !is_pending_actuator {
                continue;
            }
            let path = self.path(base, id);
            if let NodeKind::Complex { controllable, .. } = &mut self.nodes[id].kind {
                *controllable = Some(enabled);
            }
            writes.push(Write::Set(
                join_path(&path, CONTROLLABLE_KEY),
                Value::Boolean(enabled),
            ));
        }
        writes
    }
}
