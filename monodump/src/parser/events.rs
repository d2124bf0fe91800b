//! Typed event records and their byte-level decoders.
//!
//! Every record is a fixed-position prefix of little-endian fields,
//! optionally followed by a counted variable section. Strings are
//! NUL-terminated UTF-16LE. Offsets follow the Mono profiler's EventPipe
//! payload layouts; see the table in `parser::layout` docs.

use crate::domain::{AddressId, DecodeError, ModuleId, ObjectId, VTableId};

/// Stride of the object-reference variable section.
///
/// Two encodings exist historically. `Full12` carries a `u32` field offset
/// and a `u64` child object id per entry; `Packed8` is the legacy layout
/// with the child id truncated to `u32`. The stride is always an explicit
/// caller decision derived from the protocol version in effect, never
/// inferred from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefStride {
    /// Legacy encoding: `offset: u32, object_id: u32` (8 bytes/entry).
    Packed8,
    /// Current encoding: `offset: u32, object_id: u64` (12 bytes/entry).
    Full12,
}

impl RefStride {
    #[must_use]
    pub fn entry_size(self) -> usize {
        match self {
            RefStride::Packed8 => 8,
            RefStride::Full12 => 12,
        }
    }
}

/// GC phase markers reported by the `GCEvent` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GcPhase {
    Start = 0,
    End = 5,
    PreStopWorld = 6,
    PostStopWorld = 7,
    PreStartWorld = 8,
    PostStartWorld = 9,
    PreStopWorldLocked = 10,
    PostStartWorldUnlocked = 11,
}

impl GcPhase {
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Start),
            5 => Some(Self::End),
            6 => Some(Self::PreStopWorld),
            7 => Some(Self::PostStopWorld),
            8 => Some(Self::PreStartWorld),
            9 => Some(Self::PostStartWorld),
            10 => Some(Self::PreStopWorldLocked),
            11 => Some(Self::PostStartWorldUnlocked),
            _ => None,
        }
    }
}

/// `GCEvent`: a collection phase transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcPhaseEvent {
    /// Raw phase byte; unknown values are carried through, not rejected.
    pub phase: u8,
    pub generation: i32,
}

impl GcPhaseEvent {
    #[must_use]
    pub fn phase(&self) -> Option<GcPhase> {
        GcPhase::from_raw(self.phase)
    }
}

/// `GCRootRegister`: a new root memory range came into existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRegisterEvent {
    /// Start address of the range; also the root's identity.
    pub root_id: AddressId,
    pub size: u64,
    pub kind: u8,
    pub key_id: u64,
    /// Human-readable root category ("Stack", "Handle Table", ...).
    pub key_name: String,
}

/// `GCRootUnregister`: the range registered at `root_id` went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootUnregisterEvent {
    pub root_id: AddressId,
}

/// One entry of a `GCRoots` batch: an object held live by the root slot
/// at `address_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootEntry {
    pub object_id: ObjectId,
    pub address_id: AddressId,
}

/// `GCRoots`: a batch of root-held objects observed during the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootsBatchEvent {
    pub entries: Vec<RootEntry>,
}

/// `GCHeapDumpObjectReference`: one live object and its outgoing edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReferenceEvent {
    pub object_id: ObjectId,
    pub vtable_id: VTableId,
    pub size: u64,
    pub generation: u8,
    /// Object ids of every outgoing reference, in field order.
    pub children: Vec<ObjectId>,
}

/// `GCHeapDumpVTableClassReference`: names the type behind a vtable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableClassEvent {
    pub vtable_id: VTableId,
    pub class_id: u64,
    pub module_id: ModuleId,
    pub class_name: String,
}

/// Sequential little-endian reader over one event payload.
///
/// All records lay their fixed fields out contiguously, so a cursor
/// reproduces the documented offsets exactly while keeping every read
/// bounds-checked.
struct Payload<'a> {
    event_id: u16,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Payload<'a> {
    fn new(event_id: u16, buf: &'a [u8]) -> Self {
        Self { event_id, buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(DecodeError::TruncatedPayload {
                event_id: self.event_id,
                needed: end,
                have: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    /// Number of elements the variable section may hold, validated against
    /// the bytes actually remaining.
    #[allow(clippy::cast_sign_loss)]
    fn counted(&self, count: i32, entry_size: usize) -> Result<usize, DecodeError> {
        let err = || DecodeError::CountOutOfBounds {
            event_id: self.event_id,
            count: count as u32,
            have: self.buf.len(),
        };
        let count = usize::try_from(count).map_err(|_| err())?;
        let remaining = self.buf.len() - self.pos;
        match count.checked_mul(entry_size) {
            Some(bytes) if bytes <= remaining => Ok(count),
            _ => Err(err()),
        }
    }

    /// NUL-terminated UTF-16LE string. A missing terminator reads to the
    /// end of the payload instead of failing; the runtime occasionally
    /// elides the NUL on the last field of a record.
    fn utf16z(&mut self) -> String {
        let mut units = Vec::new();
        while self.pos + 2 <= self.buf.len() {
            let unit = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
            self.pos += 2;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        String::from_utf16_lossy(&units)
    }
}

pub(super) fn decode_gc_phase(event_id: u16, buf: &[u8]) -> Result<GcPhaseEvent, DecodeError> {
    let mut p = Payload::new(event_id, buf);
    Ok(GcPhaseEvent { phase: p.u8()?, generation: p.i32()? })
}

pub(super) fn decode_root_register(
    event_id: u16,
    buf: &[u8],
) -> Result<RootRegisterEvent, DecodeError> {
    let mut p = Payload::new(event_id, buf);
    Ok(RootRegisterEvent {
        root_id: AddressId(p.u64()?),
        size: p.u64()?,
        kind: p.u8()?,
        key_id: p.u64()?,
        key_name: p.utf16z(),
    })
}

pub(super) fn decode_root_unregister(
    event_id: u16,
    buf: &[u8],
) -> Result<RootUnregisterEvent, DecodeError> {
    let mut p = Payload::new(event_id, buf);
    Ok(RootUnregisterEvent { root_id: AddressId(p.u64()?) })
}

pub(super) fn decode_roots_batch(event_id: u16, buf: &[u8]) -> Result<RootsBatchEvent, DecodeError> {
    let mut p = Payload::new(event_id, buf);
    let count = p.i32()?;
    let count = p.counted(count, 16)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(RootEntry {
            object_id: ObjectId(p.u64()?),
            address_id: AddressId(p.u64()?),
        });
    }
    Ok(RootsBatchEvent { entries })
}

pub(super) fn decode_object_reference(
    event_id: u16,
    buf: &[u8],
    stride: RefStride,
) -> Result<ObjectReferenceEvent, DecodeError> {
    let mut p = Payload::new(event_id, buf);
    let object_id = ObjectId(p.u64()?);
    let vtable_id = VTableId(p.u64()?);
    let size = p.u64()?;
    let generation = p.u8()?;
    let count = p.i32()?;
    let count = p.counted(count, stride.entry_size())?;
    let mut children = Vec::with_capacity(count);
    for _ in 0..count {
        // Field offset within the parent; the graph does not use it.
        let _offset = p.u32()?;
        let child = match stride {
            RefStride::Packed8 => u64::from(p.u32()?),
            RefStride::Full12 => p.u64()?,
        };
        children.push(ObjectId(child));
    }
    Ok(ObjectReferenceEvent { object_id, vtable_id, size, generation, children })
}

pub(super) fn decode_vtable_class(event_id: u16, buf: &[u8]) -> Result<VTableClassEvent, DecodeError> {
    let mut p = Payload::new(event_id, buf);
    Ok(VTableClassEvent {
        vtable_id: VTableId(p.u64()?),
        class_id: p.u64()?,
        module_id: ModuleId(p.u64()?),
        class_name: p.utf16z(),
    })
}
