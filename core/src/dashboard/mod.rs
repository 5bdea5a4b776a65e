// Dashboard module - Tabs, layouts and widgets mirrored onto the shared namespace
//
// Callers build the tree lazily through the root; `update()` flushes whatever changed
// since the previous pass.

mod container;
mod tree;
mod widget;

pub use container::{Layout, Tab};
pub use widget::{Sendable, Supplier, Widget};

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diagnostics::DiagnosticSink;
use crate::namespace::{join_path, Namespace, Value};
use tree::{Metadata, NodeId, Tree, Write};

/// Base table every dashboard key lives under
pub const BASE_TABLE_NAME: &str = "/Shuffleboard";

pub(crate) const METADATA_TABLE: &str = ".metadata";
pub(crate) const TYPE_KEY: &str = ".type";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("Title '{title}' under '{parent}' is already used by a {existing}")]
    TitleConflict {
        parent: String,
        title: String,
        existing: &'static str,
    },
}

/// State shared by the root and every node handle
pub(crate) struct Shared {
    tree: Mutex<Tree>,
    // Held from collecting a batch until it is published, so batches land in order
    publishing: Mutex<()>,
    namespace: Arc<dyn Namespace>,
    diagnostics: Arc<dyn DiagnosticSink>,
    base_table: String,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Tree> {
        // Tree mutations never leave it half-updated, so a poisoned lock is still usable
        self.tree.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish_guard(&self) -> MutexGuard<'_, ()> {
        self.publishing.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Mutate a node's display metadata; it is republished on the next update
    pub(crate) fn edit_meta(&self, id: NodeId, edit: impl FnOnce(&mut Metadata)) {
        let mut tree = self.lock();
        let meta = &mut tree.node_mut(id).meta;
        edit(meta);
        meta.dirty = true;
    }

    pub(crate) fn path(&self, id: NodeId) -> String {
        self.lock().path(&self.base_table, id)
    }

    fn metadata_key(&self, key: &str) -> String {
        join_path(&join_path(&self.base_table, METADATA_TABLE), key)
    }

    pub(crate) fn get_or_create_layout(
        &self,
        parent: NodeId,
        layout_type: &str,
        title: &str,
    ) -> Result<NodeId, DashboardError> {
        let mut tree = self.lock();
        let (id, recorded) = tree.get_or_create_layout(parent, layout_type, title)?;
        if let Some(recorded) = recorded {
            warn!(
                target: "shuffleboard",
                layout = %tree.path(&self.base_table, id),
                requested = %layout_type,
                recorded = %recorded,
                "Layout type mismatch; keeping the type it was created with"
            );
        }
        Ok(id)
    }

    pub(crate) fn add_simple(
        &self,
        parent: NodeId,
        title: &str,
        value: Value,
    ) -> Result<NodeId, DashboardError> {
        self.lock().add_simple(parent, title, value)
    }

    pub(crate) fn add_supplied(
        &self,
        parent: NodeId,
        title: &str,
        supplier: Supplier,
    ) -> Result<NodeId, DashboardError> {
        self.lock().add_supplied(parent, title, supplier)
    }

    pub(crate) fn add_complex(
        &self,
        parent: NodeId,
        title: &str,
        sendable: Arc<dyn Sendable>,
    ) -> Result<NodeId, DashboardError> {
        self.lock().add_complex(parent, title, sendable)
    }

    /// Push writes to the namespace. Failures are reported, never propagated.
    fn publish(&self, writes: Vec<Write>) {
        let total = writes.len();
        let mut failed = 0usize;
        let mut first_error = None;

        for write in writes {
            let (path, result) = match write {
                Write::Set(path, value) => {
                    let result = self.namespace.set(&path, value);
                    (path, result)
                }
                Write::SetDefault(path, value) => {
                    let result = self.namespace.set_default(&path, value).map(|_| ());
                    (path, result)
                }
                Write::Delete(path) => {
                    let result = self.namespace.delete(&path);
                    (path, result)
                }
            };
            if let Err(e) = result {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(format!("{}: {}", path, e));
                }
            }
        }

        if let Some(first) = first_error {
            self.diagnostics.report_warning(&format!(
                "Failed to write {} of {} dashboard entries (first: {})",
                failed, total, first
            ));
        } else if total > 0 {
            debug!(target: "shuffleboard", writes = total, "Dashboard entries flushed");
        }
    }
}

/// Owns the tabs and drives the periodic flush to the namespace
#[derive(Clone)]
pub struct ShuffleboardRoot {
    shared: Arc<Shared>,
}

impl ShuffleboardRoot {
    pub fn new(namespace: Arc<dyn Namespace>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self::with_base_table(namespace, diagnostics, BASE_TABLE_NAME)
    }

    pub fn with_base_table(
        namespace: Arc<dyn Namespace>,
        diagnostics: Arc<dyn DiagnosticSink>,
        base_table: impl Into<String>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                tree: Mutex::new(Tree::new()),
                publishing: Mutex::new(()),
                namespace,
                diagnostics,
                base_table: base_table.into(),
            }),
        }
    }

    pub fn base_table(&self) -> &str {
        &self.shared.base_table
    }

    /// Get the tab with the given title, creating it if needed. Any title is accepted,
    /// including the empty string.
    pub fn get_tab(&self, title: &str) -> Tab {
        let (id, created) = self.shared.lock().get_or_create_tab(title);
        if created {
            info!(target: "shuffleboard", tab = %title, "Created dashboard tab");
        }
        Tab::new(Arc::clone(&self.shared), id)
    }

    /// Find or create a layout directly under `tab`
    pub fn get_layout(
        &self,
        tab: &Tab,
        layout_type: &str,
        title: &str,
    ) -> Result<Layout, DashboardError> {
        tab.get_layout(layout_type, title)
    }

    pub fn tab_titles(&self) -> Vec<String> {
        self.shared.lock().tab_titles()
    }

    /// Flush every pending metadata, structure and value change
    pub fn update(&self) {
        let _publishing = self.shared.publish_guard();
        let writes = self.shared.lock().flush(&self.shared.base_table);
        self.shared.publish(writes);
    }

    pub fn actuators_enabled(&self) -> bool {
        self.shared.lock().actuators_enabled()
    }

    /// Let the remote client drive actuator widgets (test mode only)
    pub fn enable_actuator_widgets(&self) {
        self.set_actuators(true);
    }

    /// Take actuator control away from the remote client.
    ///
    /// Runs a full update first so every widget is initialized before it is disabled.
    pub fn disable_actuator_widgets(&self) {
        self.update();
        self.set_actuators(false);
    }

    fn set_actuators(&self, enabled: bool) {
        let _publishing = self.shared.publish_guard();
        let mut writes = vec![Write::Set(
            self.shared.metadata_key("ActuatorsEnabled"),
            Value::Boolean(enabled),
        )];
        writes.extend(
            self.shared
                .lock()
                .set_actuators(&self.shared.base_table, enabled),
        );
        info!(target: "shuffleboard", enabled, "Actuator widgets toggled");
        self.shared.publish(writes);
    }

    /// Ask the remote client to focus the tab with this title
    pub fn select_tab(&self, title: &str) {
        self.shared.publish(vec![Write::Set(
            self.shared.metadata_key("Selected"),
            Value::String(title.to_string()),
        )]);
    }

    /// Ask the remote client to focus the tab at this index, in creation order
    pub fn select_tab_index(&self, index: usize) {
        let title = self.shared.lock().tab_titles().get(index).cloned();
        match title {
            Some(title) => self.select_tab(&title),
            None => self
                .shared
                .diagnostics
                .report_warning(&format!("No dashboard tab at index {}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::namespace::{MockNamespace, NamespaceError};
    use mockall::predicate::{always, eq};
    use mockall::Sequence;

    #[test]
    fn disable_flushes_tree_before_flag() {
        let mut ns = MockNamespace::new();
        let mut seq = Sequence::new();
        ns.expect_set()
            .with(eq("/Shuffleboard/.metadata/Tabs"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        ns.expect_set()
            .with(eq("/Shuffleboard/Test/.type"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        ns.expect_set_default()
            .with(eq("/Shuffleboard/Test/Arm"), eq(Value::Double(0.5)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        ns.expect_set()
            .with(
                eq("/Shuffleboard/.metadata/ActuatorsEnabled"),
                eq(Value::Boolean(false)),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let root = ShuffleboardRoot::new(Arc::new(ns), Arc::new(CollectingDiagnostics::new()));
        root.get_tab("Test").add("Arm", 0.5).unwrap();
        root.disable_actuator_widgets();
    }

    #[test]
    fn failed_writes_are_reported_once_per_update() {
        let mut ns = MockNamespace::new();
        ns.expect_set()
            .with(always(), always())
            .returning(|_, _| Err(NamespaceError::Unavailable));
        ns.expect_set_default()
            .with(always(), always())
            .returning(|_, _| Err(NamespaceError::Unavailable));
        let diagnostics = Arc::new(CollectingDiagnostics::new());

        let root = ShuffleboardRoot::new(Arc::new(ns), diagnostics.clone());
        let tab = root.get_tab("Tab");
        tab.add("a", 1.0).unwrap();
        tab.add("b", 2.0).unwrap();
        root.update();

        let warnings = diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Failed to write 4 of 4"));
        assert!(warnings[0].contains("Namespace unavailable"));
        assert!(diagnostics.errors().is_empty());
    }

    #[test]
    fn custom_base_table_prefixes_every_key() {
        let mut ns = MockNamespace::new();
        ns.expect_set()
            .withf(|path, _| path.starts_with("/Practice/"))
            .returning(|_, _| Ok(()));
        ns.expect_set_default()
            .withf(|path, _| path.starts_with("/Practice/"))
            .returning(|_, _| Ok(true));

        let root = ShuffleboardRoot::with_base_table(
            Arc::new(ns),
            Arc::new(CollectingDiagnostics::new()),
            "/Practice",
        );
        let widget = root.get_tab("Tab").add("x", true).unwrap();
        root.update();
        assert_eq!(widget.path(), "/Practice/Tab/x");
    }

    #[test]
    fn first_bind_keeps_a_value_the_client_already_holds() {
        let ns = crate::namespace::InMemoryNamespace::new();
        ns.set("/Shuffleboard/Tab/Speed", Value::Double(3.0)).unwrap();
        let root = ShuffleboardRoot::new(ns.clone(), Arc::new(CollectingDiagnostics::new()));

        let widget = root.get_tab("Tab").add("Speed", 0.0).unwrap();
        root.update();
        assert_eq!(ns.get("/Shuffleboard/Tab/Speed"), Some(Value::Double(3.0)));

        // A later re-add is an explicit value change
        root.get_tab("Tab").add("Speed", 1.0).unwrap();
        root.update();
        assert_eq!(widget.entry().get(), Some(Value::Double(1.0)));
    }
}
