use std::fmt;

use crate::STBuffer::Ring::layout::{
    SlotState, HAS_DELIMITER, INSTALLED, LEADING_RELEASED, SYNTHETIC, TRAILING_CLAIMED,
    TRAILING_KNOWN, TRAILING_RELEASED,
};
use crate::STBuffer::Ring::{Slot, SlotRing};
use crate::STBuffer::SpanningTupleBuffer;

const FLAG_NAMES: [(u64, &str); 7] = [
    (INSTALLED, "INSTALLED"),
    (HAS_DELIMITER, "HAS_DELIMITER"),
    (TRAILING_KNOWN, "TRAILING_KNOWN"),
    (LEADING_RELEASED, "LEADING_RELEASED"),
    (TRAILING_CLAIMED, "TRAILING_CLAIMED"),
    (TRAILING_RELEASED, "TRAILING_RELEASED"),
    (SYNTHETIC, "SYNTHETIC"),
];

/// Debug function for SpanningTupleBuffer
///
/// Shows the configuration and a dump of every slot that has been used.
pub fn debug_spanning_tuple_buffer(
    buffer: &SpanningTupleBuffer,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("SpanningTupleBuffer")
        .field("capacity", &buffer.capacity())
        .field("tuple_delimiter", &(buffer.tuple_delimiter() as char))
        .field("field_delimiter", &(buffer.field_delimiter() as char))
        .field("first_sequence", &buffer.first_sequence())
        .field("ring", buffer.ring())
        .finish()
}

/// Debug function for SlotRing
///
/// Never-used slots are skipped so large rings stay readable.
pub fn debug_slot_ring(ring: &SlotRing, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map()
        .entries(
            ring.iter()
                .filter(|(_, slot)| slot.load().generation() != 0),
        )
        .finish()
}

/// Debug function for Slot
///
/// The payload is only peeked at if its lock is free; a panic raised while a
/// claimant holds it must still be able to print the ring.
pub fn debug_slot(slot: &Slot, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut out = f.debug_struct("Slot");
    out.field("state", &slot.load());
    match slot.payload.try_lock() {
        Some(payload) => out
            .field("sequence", &payload.sequence)
            .field("bytes", &payload.data.as_ref().map(|d| d.len()))
            .field("first", &payload.first)
            .field("last", &payload.last),
        None => out.field("payload", &"<locked>"),
    };
    out.finish()
}

/// Debug function for SlotState
pub fn debug_slot_state(state: SlotState, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let flags: Vec<&str> = FLAG_NAMES
        .iter()
        .filter(|(bit, _)| state.has(*bit))
        .map(|(_, name)| *name)
        .collect();
    f.debug_struct("SlotState")
        .field("generation", &state.generation())
        .field("flags", &flags.join("|"))
        .finish()
}
