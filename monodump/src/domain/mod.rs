//! Domain model for monodump
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{AddressId, ModuleId, NodeIndex, ObjectId, TypeIndex, VTableId};

pub use errors::{CaptureError, ChannelError, DecodeError, ExportError, TargetError};
