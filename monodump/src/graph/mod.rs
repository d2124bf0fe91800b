//! # Memory graph model
//!
//! The portable output of a capture: a type table, a node table with one
//! entry per distinct object id, and a single synthetic root node that
//! anchors every true root so the graph has one entry point.
//!
//! Node identity and node definition are separate steps. `create_node`
//! hands out an index immediately so forward references (a child listed
//! before its own record arrives) resolve to a stable identity; `set_node`
//! later fills in type, size and edges, exactly once.

pub mod builder;

pub use builder::MemoryGraphBuilder;

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{ModuleId, NodeIndex, TypeIndex};

/// A second definition was attempted for a node that already has one.
/// Previously observed data for the node stays authoritative.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("node {0:?} is already defined")]
pub struct NodeAlreadyDefined(pub NodeIndex);

/// An entry in the graph's type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeType {
    pub name: String,
    pub module: String,
}

/// A defined node: its type, byte size, and outgoing edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeData {
    pub type_index: TypeIndex,
    pub size: u64,
    pub children: Vec<NodeIndex>,
}

/// The assembled object-reference graph.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    types: Vec<NodeType>,
    nodes: Vec<Option<NodeData>>,
    root_index: Option<NodeIndex>,
}

impl MemoryGraph {
    #[must_use]
    pub fn with_capacity(nodes: usize) -> Self {
        Self { types: Vec::new(), nodes: Vec::with_capacity(nodes), root_index: None }
    }

    /// Append a type table entry.
    ///
    /// # Panics
    ///
    /// Panics if the table outgrows `u32` indices; a heap cannot have four
    /// billion distinct types.
    pub fn create_type(&mut self, name: impl Into<String>, module: impl Into<String>) -> TypeIndex {
        let index = TypeIndex(u32::try_from(self.types.len()).expect("type table overflow"));
        self.types.push(NodeType { name: name.into(), module: module.into() });
        index
    }

    /// Allocate a node identity with no definition yet.
    ///
    /// # Panics
    ///
    /// Panics if the node table outgrows `u32` indices.
    pub fn create_node(&mut self) -> NodeIndex {
        let index = NodeIndex(u32::try_from(self.nodes.len()).expect("node table overflow"));
        self.nodes.push(None);
        index
    }

    #[must_use]
    pub fn is_defined(&self, index: NodeIndex) -> bool {
        self.nodes.get(index.as_usize()).is_some_and(Option::is_some)
    }

    /// Define a node's type, size and edge list.
    ///
    /// # Errors
    ///
    /// [`NodeAlreadyDefined`] if the node was defined before; the existing
    /// definition is left untouched.
    pub fn set_node(
        &mut self,
        index: NodeIndex,
        type_index: TypeIndex,
        size: u64,
        children: Vec<NodeIndex>,
    ) -> Result<(), NodeAlreadyDefined> {
        let slot = &mut self.nodes[index.as_usize()];
        if slot.is_some() {
            return Err(NodeAlreadyDefined(index));
        }
        *slot = Some(NodeData { type_index, size, children });
        Ok(())
    }

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&NodeData> {
        self.nodes.get(index.as_usize()).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn node_type(&self, index: TypeIndex) -> Option<&NodeType> {
        self.types.get(index.as_usize())
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn root_index(&self) -> Option<NodeIndex> {
        self.root_index
    }

    #[must_use]
    pub fn types(&self) -> &[NodeType] {
        &self.types
    }

    /// Nodes in index order; undefined identities are `None`.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, Option<&NodeData>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex(u32::try_from(i).expect("node table overflow")), n.as_ref()))
    }
}

/// Lookup from a type's module id to its image path, sourced from the
/// rundown collaborator. Types whose module never appeared get a
/// synthetic label.
#[derive(Debug, Default)]
pub struct ModuleMap {
    map: HashMap<ModuleId, String>,
}

impl ModuleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ModuleId, path: impl Into<String>) {
        self.map.insert(id, path.into());
    }

    #[must_use]
    pub fn resolve(&self, id: ModuleId) -> String {
        self.map.get(&id).cloned().unwrap_or_else(|| format!("(Module 0x{:x})", id.0))
    }
}

/// Assembles the synthetic root node and its named grouping children.
///
/// Grouping children ("Stack", "Handle Table", "Other Roots", ...) are
/// created lazily on first use and keep their first-seen order.
#[derive(Debug)]
pub struct RootBuilder {
    name: String,
    direct: Vec<NodeIndex>,
    groups: Vec<(String, Vec<NodeIndex>)>,
}

impl RootBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), direct: Vec::new(), groups: Vec::new() }
    }

    /// Attach a node directly under the synthetic root.
    pub fn add_child(&mut self, node: NodeIndex) {
        self.direct.push(node);
    }

    /// Attach a node under the named grouping child, creating it on first
    /// use.
    pub fn add_grouped_child(&mut self, group: &str, node: NodeIndex) {
        if let Some((_, members)) = self.groups.iter_mut().find(|(name, _)| name == group) {
            members.push(node);
            return;
        }
        self.groups.push((group.to_string(), vec![node]));
    }

    /// Materialize the grouping nodes and the root node into `graph` and
    /// mark the root. Consumes the builder; the graph is frozen for
    /// reading afterwards.
    pub fn build(self, graph: &mut MemoryGraph) -> NodeIndex {
        let mut root_children = Vec::with_capacity(self.groups.len() + self.direct.len());
        for (name, members) in self.groups {
            let type_index = graph.create_type(name, "");
            let node = graph.create_node();
            // Fresh node, cannot already be defined.
            let _ = graph.set_node(node, type_index, 0, members);
            root_children.push(node);
        }
        root_children.extend(self.direct);

        let root_type = graph.create_type(self.name, "");
        let root = graph.create_node();
        let _ = graph.set_node(root, root_type, 0, root_children);
        graph.root_index = Some(root);
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_identity_precedes_definition() {
        let mut graph = MemoryGraph::default();
        let a = graph.create_node();
        assert!(!graph.is_defined(a));
        let t = graph.create_type("Foo", "app.dll");
        graph.set_node(a, t, 24, Vec::new()).unwrap();
        assert!(graph.is_defined(a));
        assert_eq!(graph.node(a).unwrap().size, 24);
    }

    #[test]
    fn second_definition_is_rejected_and_first_wins() {
        let mut graph = MemoryGraph::default();
        let t = graph.create_type("Foo", "app.dll");
        let a = graph.create_node();
        graph.set_node(a, t, 24, Vec::new()).unwrap();
        let err = graph.set_node(a, t, 99, Vec::new()).unwrap_err();
        assert_eq!(err, NodeAlreadyDefined(a));
        assert_eq!(graph.node(a).unwrap().size, 24);
    }

    #[test]
    fn root_builder_groups_keep_first_seen_order() {
        let mut graph = MemoryGraph::default();
        let t = graph.create_type("Foo", "");
        let nodes: Vec<_> = (0..3)
            .map(|_| {
                let n = graph.create_node();
                graph.set_node(n, t, 8, Vec::new()).unwrap();
                n
            })
            .collect();

        let mut root = RootBuilder::new("[.NET Roots]");
        root.add_grouped_child("Stack", nodes[0]);
        root.add_grouped_child("Handles", nodes[1]);
        root.add_grouped_child("Stack", nodes[2]);
        let root_index = root.build(&mut graph);

        assert_eq!(graph.root_index(), Some(root_index));
        let root_node = graph.node(root_index).unwrap();
        assert_eq!(root_node.children.len(), 2);
        let stack = graph.node(root_node.children[0]).unwrap();
        assert_eq!(graph.node_type(stack.type_index).unwrap().name, "Stack");
        assert_eq!(stack.children, vec![nodes[0], nodes[2]]);
    }

    #[test]
    fn module_map_falls_back_to_synthetic_label() {
        let mut modules = ModuleMap::new();
        modules.insert(ModuleId(0x40), "/app/Game.dll");
        assert_eq!(modules.resolve(ModuleId(0x40)), "/app/Game.dll");
        assert_eq!(modules.resolve(ModuleId(0xbeef)), "(Module 0xbeef)");
    }
}
