//! # monodump - Mono GC Heap Dump Capture and Graph Reconstruction
//!
//! monodump reconstructs a snapshot of a Mono runtime's garbage-collected
//! heap from the binary event stream its GC heap-dump instrumentation
//! emits, producing a portable object-reference graph for diagnostics
//! tooling.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Mono-based Runtime                         │
//! │        (MonoProfiler EventPipe provider, GC heap dump)          │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ raw event records (file or socket)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   monodump (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │   Capture    │──▶│    Parser    │──▶│    Graph     │        │
//! │  │ (TraceChannel│   │ (typed event │   │  Correlator  │        │
//! │  │  + decode    │   │   records)   │   │ (two phases) │        │
//! │  │    task)     │   └──────┬───────┘   └──────┬───────┘        │
//! │  └──────────────┘          │                  │                │
//! │                            ▼                  ▼                │
//! │                     ┌──────────────┐   ┌──────────────┐        │
//! │                     │  Root Range  │   │    Export    │        │
//! │                     │   Tracker    │   │ (graph JSON) │        │
//! │                     └──────────────┘   └──────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`parser`]: Binary event decoder for the
//!   `Microsoft-DotNETRuntimeMonoProfiler` provider — fixed-offset
//!   little-endian records, explicit object-reference stride selection.
//!
//! - [`roots`]: Sorted, non-overlapping set of registered GC root memory
//!   ranges; resolves root slot addresses to named root categories.
//!
//! - [`graph`]: The memory graph model and the two-phase correlator that
//!   buffers streamed records and assembles nodes, types, and the
//!   synthetic root.
//!
//! - [`capture`]: Trace channel abstraction (capture file, diagnostic
//!   socket) and the coordinator that supervises the background decode
//!   task, the dump-start timeout, and stop propagation.
//!
//! - [`export`]: JSON serialization of the assembled graph.
//!
//! - [`target`]: Resolution of `--pid` / `--diagnostic-port` to a socket.
//!
//! - [`cli`]: Command-line argument parsing.
//!
//! - [`domain`]: Id newtypes and structured error types.
//!
//! ## Data Flow
//!
//! Raw bytes flow one direction: channel → decoder → typed events →
//! phase-1 buffers and root tracker → phase-2 assembly → graph. A single
//! background task does all decoding in wire order; the coordinator only
//! observes completion signals and never touches the buffers.

// Expose modules for testing
pub mod capture;
pub mod cli;
pub mod domain;
pub mod export;
pub mod graph;
pub mod parser;
pub mod roots;
pub mod target;
