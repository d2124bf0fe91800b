//! Graph export
//!
//! Serializes the assembled memory graph into a portable JSON document for
//! downstream analysis tools. The binary `.gcdump` writer lives outside
//! this tool; this module is the hand-off surface.

pub mod graph_json;

pub use graph_json::GraphExporter;
