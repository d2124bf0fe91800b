//! Structured error types for monodump
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Each layer gets its own enum: decode errors stay local to one event,
//! channel errors belong to the trace transport, capture errors are what
//! the coordinator surfaces to the caller.

use thiserror::Error;

/// A single event record's bytes are inconsistent with its declared layout.
///
/// Always recovered locally: the record is dropped and stream processing
/// continues.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("event {event_id}: payload truncated (need {needed} bytes, have {have})")]
    TruncatedPayload { event_id: u16, needed: usize, have: usize },

    #[error("event {event_id}: count {count} puts variable section past the {have}-byte payload")]
    CountOutOfBounds { event_id: u16, count: u32, have: usize },
}

/// Failures of the underlying trace transport (capture file or diagnostic
/// socket).
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("capture file has wrong magic (not a monodump event capture)")]
    BadMagic,

    #[error("unsupported capture format version {0}")]
    UnsupportedVersion(u32),

    #[error("record length {0} exceeds the {1}-byte limit")]
    OversizedRecord(u32, u32),

    #[error("failed to stop trace session: {0}")]
    StopFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the capture coordinator.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no heap-dump start acknowledgment within {0:?}")]
    Timeout(std::time::Duration),

    #[error("background decode task failed: {0}")]
    DecodeTask(String),
}

/// Failures while writing the assembled graph.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// User supplied an unusable diagnostic target. Fails before any session
/// resource is acquired.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("neither --pid nor --diagnostic-port was supplied")]
    Missing,

    #[error("--pid and --diagnostic-port are mutually exclusive")]
    Ambiguous,

    #[error("invalid diagnostic port {path:?}: {reason}")]
    InvalidPort { path: String, reason: String },
}
