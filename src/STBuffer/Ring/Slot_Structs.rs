// A single ring position: the packed state word plus the payload it guards.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::AtomicU64;

use crate::STBuffer::Structs::SequencedUnit;

/// One slot of the ring.
///
/// `#[repr(C)]` keeps the state word at offset 0; the ring wraps every slot in
/// `CachePadded` so neighbouring slots never share a cache line.
///
/// ### Concurrency Design:
/// - Every transition of the occupant (`Empty → Reserved → Installed → Claimed → Released`)
///   is a single atomic operation on `state`. Boundary searches only ever read `state`.
/// - `payload` is only locked by the installer (before `INSTALLED` is published) and by
///   the single claimant of a span (before the matching release bit is published), so
///   the lock is never contended by protocol.
#[repr(C)]
pub struct Slot {
    /// Packed generation and flags, see [`layout`](super::layout).
    pub state: AtomicU64,

    /// The occupant's bytes and delimiter offsets.
    pub(crate) payload: Mutex<SlotPayload>,
}

/// What a slot owns on behalf of its current occupant.
#[derive(Debug, Default)]
pub(crate) struct SlotPayload {
    pub sequence: u64,
    /// Dropped once every fragment has been moved out.
    pub data: Option<Bytes>,
    /// Offset of the first delimiter; `None` for undelimited units.
    pub first: Option<u32>,
    /// Offset of the last delimiter, once known.
    pub last: Option<u32>,
    pub leading_taken: bool,
    pub trailing_taken: bool,
}

impl SlotPayload {
    pub fn from_unit(unit: &SequencedUnit) -> Self {
        let offsets = unit.delimiters();
        Self {
            sequence: unit.sequence(),
            data: Some(unit.data().clone()),
            first: offsets.map(|o| o.first),
            last: offsets.and_then(|o| o.last),
            leading_taken: false,
            trailing_taken: false,
        }
    }

    /// Payload of the stream-start sentinel and of flush markers: a delimited
    /// unit without bytes.
    pub fn synthetic(sequence: u64) -> Self {
        Self {
            sequence,
            data: None,
            first: Some(0),
            last: Some(0),
            leading_taken: false,
            trailing_taken: false,
        }
    }
}

/// Result of an install attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrySet {
    Installed,
    /// The slot is already reserved or installed for the same generation.
    Duplicate { current: u64 },
    /// The slot has moved past the requested generation.
    Stale { current: u64 },
    /// An earlier-generation occupant has not been fully released yet.
    Occupied { current: u64 },
}

/// Result of trying to pass the claim gate of a span's start slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClaimGate {
    Won,
    AlreadyClaimed,
    /// Trailing boundary not recorded yet.
    NotReady,
    /// The slot no longer holds the expected generation.
    Vanished,
}
