//! # Two-phase graph correlation
//!
//! Phase 1 (streaming): decoded events are routed into flat buffers with
//! no cross-referencing — type records, object-reference records and
//! root associations each into their own list, root register/unregister
//! straight into the [`RootRangeTracker`]. This is the only place the
//! tracker is mutated; it is frozen before phase 2 reads it.
//!
//! Phase 2 (assembly): after the stream is fully drained, `build` resolves
//! types through the module map, allocates node identities (forward child
//! references included), rejects duplicate object definitions, and attaches
//! roots under the synthetic root node — grouped by resolved root range
//! name, or every object directly when the capture produced no roots data
//! at all.

use std::collections::HashMap;

use log::{debug, warn};

use crate::domain::{ObjectId, TypeIndex, VTableId};
use crate::graph::{MemoryGraph, ModuleMap, RootBuilder};
use crate::parser::{MonoProfilerEvent, ObjectReferenceEvent, RootEntry, VTableClassEvent};
use crate::roots::RootRangeTracker;

/// Name of the synthetic root node.
pub const ROOT_NODE_NAME: &str = "[.NET Roots]";

/// Grouping child for root slots that resolve to no registered range.
pub const OTHER_ROOTS: &str = "Other Roots";

/// Buffers one capture's worth of decoded records and assembles the final
/// [`MemoryGraph`]. One instance per capture; buffers are consumed exactly
/// once by [`MemoryGraphBuilder::build`].
#[derive(Debug, Default)]
pub struct MemoryGraphBuilder {
    types: Vec<VTableClassEvent>,
    objects: Vec<ObjectReferenceEvent>,
    root_entries: Vec<RootEntry>,
    /// Distinguishes "no roots-batch events at all" (fallback mode) from
    /// batches that happened to be empty.
    saw_roots_batch: bool,
}

impl MemoryGraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: route one decoded event.
    ///
    /// Runs synchronously on the decode task in wire arrival order.
    pub fn observe(&mut self, event: MonoProfilerEvent, tracker: &mut RootRangeTracker) {
        match event {
            MonoProfilerEvent::VTableClassReference(ev) => self.types.push(ev),
            MonoProfilerEvent::ObjectReference(ev) => self.objects.push(ev),
            MonoProfilerEvent::RootsBatch(ev) => {
                self.saw_roots_batch = true;
                self.root_entries.extend(ev.entries);
            }
            MonoProfilerEvent::RootRegister(ev) => tracker.register(&ev),
            MonoProfilerEvent::RootUnregister(ev) => tracker.unregister(&ev),
            // Lifecycle markers are the coordinator's concern; phase
            // events carry nothing the graph needs.
            MonoProfilerEvent::GcPhase(_)
            | MonoProfilerEvent::HeapDumpStart
            | MonoProfilerEvent::HeapDumpStop => {}
        }
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Phase 2: assemble the graph. The tracker must not be mutated again
    /// until this returns.
    #[must_use]
    pub fn build(self, tracker: &RootRangeTracker, modules: &ModuleMap) -> MemoryGraph {
        let mut graph = MemoryGraph::with_capacity(self.objects.len());
        let mut root_builder = RootBuilder::new(ROOT_NODE_NAME);

        // Type table: first occurrence of a vtable wins, and types sharing
        // (class name, module name) share one slot.
        let mut vtable_types: HashMap<VTableId, TypeIndex> = HashMap::new();
        let mut type_slots: HashMap<(String, String), TypeIndex> = HashMap::new();
        for ty in &self.types {
            if vtable_types.contains_key(&ty.vtable_id) {
                continue;
            }
            let module = modules.resolve(ty.module_id);
            let key = (ty.class_name.clone(), module);
            let type_index = match type_slots.get(&key) {
                Some(&index) => index,
                None => {
                    let index = graph.create_type(key.0.clone(), key.1.clone());
                    type_slots.insert(key, index);
                    index
                }
            };
            vtable_types.insert(ty.vtable_id, type_index);
        }

        // Node table. Children may be referenced before their own record
        // arrives, so identity allocation is decoupled from definition.
        let mut node_ids: HashMap<ObjectId, crate::domain::NodeIndex> = HashMap::new();
        let mut ensure_node = |graph: &mut MemoryGraph, id: ObjectId| {
            *node_ids.entry(id).or_insert_with(|| graph.create_node())
        };

        let mut duplicates = 0usize;
        let mut defined_nodes = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let node = ensure_node(&mut graph, object.object_id);
            if graph.is_defined(node) {
                warn!("duplicate object id {} in dump; keeping first record", object.object_id);
                duplicates += 1;
                continue;
            }
            let children: Vec<_> =
                object.children.iter().map(|&child| ensure_node(&mut graph, child)).collect();
            let type_index = match vtable_types.get(&object.vtable_id) {
                Some(&index) => index,
                None => {
                    // No vtable-class record arrived for this type.
                    debug!("object {} has unresolved vtable {}", object.object_id, object.vtable_id);
                    let index = graph.create_type(format!("(vtable {})", object.vtable_id), "");
                    vtable_types.insert(object.vtable_id, index);
                    index
                }
            };
            // Fresh identity, definition cannot fail.
            let _ = graph.set_node(node, type_index, object.size, children);
            defined_nodes.push(node);
        }
        if duplicates > 0 {
            warn!("dropped {duplicates} duplicate object definitions");
        }

        // Root attachment.
        if self.saw_roots_batch {
            for entry in &self.root_entries {
                if let Some(&node) = node_ids.get(&entry.object_id) {
                    let group = tracker
                        .find(entry.address_id)
                        .map_or(OTHER_ROOTS, |range| range.name.as_str());
                    root_builder.add_grouped_child(group, node);
                }
            }
        } else {
            // Some capture configurations omit root enumeration entirely;
            // anchor every defined object so the graph is still reachable.
            warn!("missing GC roots data; reporting every object as a root");
            for node in defined_nodes {
                root_builder.add_child(node);
            }
        }

        root_builder.build(&mut graph);
        graph
    }
}
