//! Newtype wrappers for the raw 64-bit identifiers that flow through the
//! trace stream.
//!
//! The Mono profiler reports everything as pointer-sized integers: object
//! addresses, vtable addresses, module handles, root slot addresses. Mixing
//! them up compiles fine and produces garbage graphs, so each gets its own
//! type.

use std::fmt;

use serde::Serialize;

/// Address of a live object on the GC heap. Doubles as the object's
/// identity for the duration of one dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Address of a type's vtable; stands in for the runtime type in the
/// trace stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VTableId(pub u64);

/// Runtime handle of a loaded module (assembly image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u64);

/// Address of a root slot (stack location, static field, handle table
/// entry) holding an object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressId(pub u64);

/// Index of a node in the assembled memory graph. Serializes as a bare
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeIndex(pub u32);

/// Index of an entry in the memory graph's type table. Serializes as a
/// bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypeIndex(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Display for VTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl NodeIndex {
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TypeIndex {
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}
