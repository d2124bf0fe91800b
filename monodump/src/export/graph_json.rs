//! JSON rendition of a [`MemoryGraph`].
//!
//! The shape mirrors the in-memory graph one to one: a type table, a node
//! table indexed by node id (undefined identities serialize as `null`),
//! and the synthetic root's index.

use std::io::Write;

use serde::Serialize;

use crate::domain::{ExportError, NodeIndex};
use crate::graph::{MemoryGraph, NodeData, NodeType};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphDocument<'a> {
    format: &'static str,
    version: u32,
    types: &'a [NodeType],
    nodes: Vec<Option<&'a NodeData>>,
    root_index: Option<NodeIndex>,
}

/// Writes a frozen graph as JSON.
pub struct GraphExporter;

impl GraphExporter {
    /// Serialize `graph` into `writer`.
    ///
    /// # Errors
    ///
    /// [`ExportError`] on serialization or I/O failure.
    pub fn export<W: Write>(graph: &MemoryGraph, mut writer: W) -> Result<(), ExportError> {
        let doc = GraphDocument {
            format: "monodump-heap-graph",
            version: 1,
            types: graph.types(),
            nodes: graph.nodes().map(|(_, node)| node).collect(),
            root_index: graph.root_index(),
        };
        serde_json::to_writer(&mut writer, &doc)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_creates_valid_json() {
        let mut graph = MemoryGraph::default();
        let t = graph.create_type("Foo", "app.dll");
        let a = graph.create_node();
        let b = graph.create_node();
        graph.set_node(a, t, 24, vec![b]).unwrap();

        let mut buffer = Vec::new();
        GraphExporter::export(&graph, &mut buffer).expect("export");

        let parsed: serde_json::Value = serde_json::from_slice(&buffer).expect("valid JSON");
        assert_eq!(parsed["format"], "monodump-heap-graph");
        assert_eq!(parsed["types"][0]["name"], "Foo");
        assert_eq!(parsed["nodes"][0]["size"], 24);
        assert_eq!(parsed["nodes"][0]["children"][0], 1);
        // Node b has an identity but no definition.
        assert!(parsed["nodes"][1].is_null());
        assert!(parsed["rootIndex"].is_null());
    }
}
