//! # Mono profiler event decoding
//!
//! Interprets raw EventPipe payloads from the
//! `Microsoft-DotNETRuntimeMonoProfiler` provider into typed records.
//!
//! ## Record layouts (byte offsets, little-endian)
//!
//! | Event | Fields |
//! |---|---|
//! | GC phase (38) | 0: phase(u8); 1: generation(i32) |
//! | Root register (49) | 0: rootId(u64); 8: size(u64); 16: kind(u8); 17: keyId(u64); 25: keyName(utf16z) |
//! | Root unregister (50) | 0: rootId(u64) |
//! | Heap dump start/stop (51/52) | no payload |
//! | Object reference (53) | 0: objectId(u64); 8: vtableId(u64); 16: size(u64); 24: generation(u8); 25: count(i32); entries at 29 |
//! | Roots batch (54) | 0: count(i32); entries at 4, stride 16: objectId(u64), addressId(u64) |
//! | VTable class reference (63) | 0: vtableId(u64); 8: classId(u64); 16: moduleId(u64); 24: className(utf16z) |
//!
//! Decoding is pure and stateless per call; the only ambient input is the
//! [`RefStride`] of the object-reference variable section, which the caller
//! pins to the protocol version of the capture.

pub mod events;

pub use events::{
    GcPhase, GcPhaseEvent, ObjectReferenceEvent, RefStride, RootEntry, RootRegisterEvent,
    RootUnregisterEvent, RootsBatchEvent, VTableClassEvent,
};

use crate::domain::DecodeError;

/// Provider GUID of `Microsoft-DotNETRuntimeMonoProfiler`.
pub const PROVIDER_GUID: u128 = 0x7F44_2D82_0F1D_5155_4B8C_1529_EB2E_31C2;

/// Provider name used when enabling the EventPipe session.
pub const PROVIDER_NAME: &str = "Microsoft-DotNETRuntimeMonoProfiler";

/// Task GUID shared by all MonoProfiler events.
pub const TASK_GUID: u128 = 0x7EC3_9CC6_C9E3_4328_9B32_CA6C_5EC0_EF31;

/// Event ids of the records this tool subscribes to.
pub mod event_id {
    pub const GC_EVENT: u16 = 38;
    pub const GC_ROOT_REGISTER: u16 = 49;
    pub const GC_ROOT_UNREGISTER: u16 = 50;
    pub const GC_HEAP_DUMP_START: u16 = 51;
    pub const GC_HEAP_DUMP_STOP: u16 = 52;
    pub const GC_HEAP_DUMP_OBJECT_REFERENCE: u16 = 53;
    pub const GC_ROOTS: u16 = 54;
    pub const GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE: u16 = 63;
}

/// Keyword bits selecting instrumentation categories for a session.
pub mod keywords {
    pub const GC: u64 = 0x1;
    pub const GC_HEAP_DUMP: u64 = 0x10_0000;
    pub const GC_HEAP_COLLECT: u64 = 0x80_0000;
    pub const GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE: u64 = 0x800_0000;

    /// Bitmask a heap-dump session enables.
    #[must_use]
    pub fn session_mask() -> u64 {
        GC | GC_HEAP_DUMP | GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE
    }
}

/// `(event id, opcode)` pairs to register interest in when attaching to a
/// trace channel. The opcode is always event id + 17 in this provider.
pub const SUBSCRIPTIONS: [(u16, u8); 8] = [
    (event_id::GC_EVENT, 55),
    (event_id::GC_ROOT_REGISTER, 66),
    (event_id::GC_ROOT_UNREGISTER, 67),
    (event_id::GC_HEAP_DUMP_START, 68),
    (event_id::GC_HEAP_DUMP_STOP, 69),
    (event_id::GC_HEAP_DUMP_OBJECT_REFERENCE, 70),
    (event_id::GC_ROOTS, 71),
    (event_id::GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE, 80),
];

/// One decoded event from the profiler stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonoProfilerEvent {
    GcPhase(GcPhaseEvent),
    RootRegister(RootRegisterEvent),
    RootUnregister(RootUnregisterEvent),
    RootsBatch(RootsBatchEvent),
    HeapDumpStart,
    HeapDumpStop,
    ObjectReference(ObjectReferenceEvent),
    VTableClassReference(VTableClassEvent),
}

/// Decode one raw record.
///
/// Returns `Ok(None)` for event ids outside this provider's subscription
/// set so a channel may multiplex other providers. A malformed payload
/// fails only this record; the stream stays usable.
///
/// # Errors
///
/// [`DecodeError`] when the payload is shorter than the record's fixed
/// prefix or its count field points past the end of the buffer.
pub fn decode(
    event_id: u16,
    payload: &[u8],
    stride: RefStride,
) -> Result<Option<MonoProfilerEvent>, DecodeError> {
    let event = match event_id {
        event_id::GC_EVENT => {
            MonoProfilerEvent::GcPhase(events::decode_gc_phase(event_id, payload)?)
        }
        event_id::GC_ROOT_REGISTER => {
            MonoProfilerEvent::RootRegister(events::decode_root_register(event_id, payload)?)
        }
        event_id::GC_ROOT_UNREGISTER => {
            MonoProfilerEvent::RootUnregister(events::decode_root_unregister(event_id, payload)?)
        }
        event_id::GC_HEAP_DUMP_START => MonoProfilerEvent::HeapDumpStart,
        event_id::GC_HEAP_DUMP_STOP => MonoProfilerEvent::HeapDumpStop,
        event_id::GC_HEAP_DUMP_OBJECT_REFERENCE => MonoProfilerEvent::ObjectReference(
            events::decode_object_reference(event_id, payload, stride)?,
        ),
        event_id::GC_ROOTS => {
            MonoProfilerEvent::RootsBatch(events::decode_roots_batch(event_id, payload)?)
        }
        event_id::GC_HEAP_DUMP_VTABLE_CLASS_REFERENCE => {
            MonoProfilerEvent::VTableClassReference(events::decode_vtable_class(event_id, payload)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}
