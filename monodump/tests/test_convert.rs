//! End-to-end: framed capture file → graph → JSON export.

use std::io::Write;

use monodump::capture::channel::{CAPTURE_MAGIC, CAPTURE_VERSION};
use monodump::capture::{capture, CaptureConfig, FileChannel};
use monodump::export::GraphExporter;
use monodump::graph::ModuleMap;
use monodump::parser::event_id;
use monodump::roots::RootRangeTracker;

fn utf16z(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    out
}

struct CaptureFile {
    buf: Vec<u8>,
}

impl CaptureFile {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CAPTURE_MAGIC);
        buf.extend_from_slice(&CAPTURE_VERSION.to_le_bytes());
        Self { buf }
    }

    fn record(&mut self, event_id: u16, payload: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&event_id.to_le_bytes());
        self.buf.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_le_bytes());
        self.buf.extend_from_slice(payload);
        self
    }

    fn write_to_temp(&self) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&self.buf).unwrap();
        file
    }
}

#[tokio::test]
async fn convert_rebuilds_graph_and_exports_valid_json() {
    let mut capture_file = CaptureFile::new();

    // Root register: range [0x1000, 0x1100) named "Stack".
    let mut root = Vec::new();
    root.extend_from_slice(&0x1000u64.to_le_bytes());
    root.extend_from_slice(&0x100u64.to_le_bytes());
    root.push(0);
    root.extend_from_slice(&0u64.to_le_bytes());
    root.extend_from_slice(&utf16z("Stack"));

    // Object 5, vtable 9, 24 bytes, no children.
    let mut object = Vec::new();
    object.extend_from_slice(&5u64.to_le_bytes());
    object.extend_from_slice(&9u64.to_le_bytes());
    object.extend_from_slice(&24u64.to_le_bytes());
    object.push(0);
    object.extend_from_slice(&0i32.to_le_bytes());

    // Type record for vtable 9.
    let mut vtable = Vec::new();
    vtable.extend_from_slice(&9u64.to_le_bytes());
    vtable.extend_from_slice(&0u64.to_le_bytes());
    vtable.extend_from_slice(&0x40u64.to_le_bytes());
    vtable.extend_from_slice(&utf16z("Foo"));

    // One root association: object 5 held at 0x1050.
    let mut roots = Vec::new();
    roots.extend_from_slice(&1i32.to_le_bytes());
    roots.extend_from_slice(&5u64.to_le_bytes());
    roots.extend_from_slice(&0x1050u64.to_le_bytes());

    capture_file
        .record(event_id::GC_ROOT_REGISTER, &root)
        .record(event_id::GC_HEAP_DUMP_START, &[])
        .record(event_id::GC_HEAP_DUMP_OBJECT_REFERENCE, &object)
        .record(event_id::GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE, &vtable)
        .record(event_id::GC_ROOTS, &roots)
        .record(event_id::GC_HEAP_DUMP_STOP, &[]);
    let file = capture_file.write_to_temp();

    let channel = FileChannel::open(file.path()).await.expect("open capture");
    let outcome = capture(channel, RootRangeTracker::new(), &ModuleMap::new(), CaptureConfig::default())
        .await
        .expect("convert capture");

    let mut buffer = Vec::new();
    GraphExporter::export(&outcome.graph, &mut buffer).expect("export graph");

    let parsed: serde_json::Value = serde_json::from_slice(&buffer).expect("valid JSON");
    assert_eq!(parsed["format"], "monodump-heap-graph");

    let types: Vec<&str> =
        parsed["types"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert!(types.contains(&"Foo"));
    assert!(types.contains(&"Stack"));
    assert!(types.contains(&"[.NET Roots]"));

    // Root node → "Stack" grouping → object of type Foo, 24 bytes.
    let root_index = parsed["rootIndex"].as_u64().unwrap() as usize;
    let nodes = parsed["nodes"].as_array().unwrap();
    let root_children = nodes[root_index]["children"].as_array().unwrap();
    assert_eq!(root_children.len(), 1);
    let group = &nodes[root_children[0].as_u64().unwrap() as usize];
    let members = group["children"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    let object = &nodes[members[0].as_u64().unwrap() as usize];
    assert_eq!(object["size"], 24);
}

#[tokio::test]
async fn convert_without_roots_reports_objects_directly() {
    let mut capture_file = CaptureFile::new();

    let mut object = Vec::new();
    object.extend_from_slice(&5u64.to_le_bytes());
    object.extend_from_slice(&9u64.to_le_bytes());
    object.extend_from_slice(&24u64.to_le_bytes());
    object.push(0);
    object.extend_from_slice(&0i32.to_le_bytes());

    let mut vtable = Vec::new();
    vtable.extend_from_slice(&9u64.to_le_bytes());
    vtable.extend_from_slice(&0u64.to_le_bytes());
    vtable.extend_from_slice(&0u64.to_le_bytes());
    vtable.extend_from_slice(&utf16z("Foo"));

    capture_file
        .record(event_id::GC_HEAP_DUMP_START, &[])
        .record(event_id::GC_HEAP_DUMP_OBJECT_REFERENCE, &object)
        .record(event_id::GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE, &vtable)
        .record(event_id::GC_HEAP_DUMP_STOP, &[]);
    let file = capture_file.write_to_temp();

    let channel = FileChannel::open(file.path()).await.expect("open capture");
    let outcome = capture(channel, RootRangeTracker::new(), &ModuleMap::new(), CaptureConfig::default())
        .await
        .expect("convert capture");

    let graph = &outcome.graph;
    let root = graph.node(graph.root_index().unwrap()).unwrap();
    assert_eq!(root.children.len(), 1);
    let node = graph.node(root.children[0]).unwrap();
    assert_eq!(graph.node_type(node.type_index).unwrap().name, "Foo");
}
