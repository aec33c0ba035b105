// Exactly-once hand-off of spanning records.
//
// A span always runs from one delimited unit (start) to the next delimited unit
// (end) with only undelimited units in between. Each delimited unit starts
// exactly one span, so the start slot's TRAILING_CLAIMED bit is the single gate
// every discovery path has to pass. Whoever wins it collects the whole span.

use tracing::{debug, trace};

use super::search::{search_leading, search_trailing, Boundary};
use super::Ring::{ClaimGate, SlotRing};
use super::Structs::{Claim, SpanningRecord};
use crate::Core::error::{FormatError, Result};

/// Pass the claim gate of the span starting at `start`.
pub fn claim_span(ring: &SlotRing, start: u64) -> Claim<()> {
    let (slot, generation) = ring.slot_for(start);
    match slot.try_claim_span(generation) {
        ClaimGate::Won => Claim::Resolved(()),
        ClaimGate::NotReady => Claim::OutOfRange,
        // a start slot only leaves its generation after its span was released
        ClaimGate::AlreadyClaimed | ClaimGate::Vanished => {
            trace!(start, "span already claimed");
            Claim::ClaimedElsewhere
        }
    }
}

/// Search backwards from the delimited unit `end` and claim the span it closes.
/// Resolves to the start sequence number.
pub fn claiming_leading_delimiter_search(ring: &SlotRing, end: u64) -> Result<Claim<u64>> {
    match search_leading(ring, end) {
        Boundary::Found {
            distance,
            trailing_known,
        } => {
            if !trailing_known {
                return Ok(Claim::OutOfRange);
            }
            let start = end - distance;
            Ok(claim_span(ring, start).map(|()| start))
        }
        Boundary::OutOfRange => Ok(Claim::OutOfRange),
        Boundary::CapacityExceeded => Err(exceeded(ring, end.saturating_sub(ring.capacity() as u64), end)),
    }
}

/// Search forwards from the delimited unit `start` and claim the span it opens.
/// Resolves to the end sequence number.
pub fn claiming_trailing_delimiter_search(ring: &SlotRing, start: u64) -> Result<Claim<u64>> {
    match search_trailing(ring, start) {
        Boundary::Found { distance, .. } => {
            let end = start + distance;
            Ok(claim_span(ring, start).map(|()| end))
        }
        Boundary::OutOfRange => Ok(Claim::OutOfRange),
        Boundary::CapacityExceeded => Err(exceeded(ring, start, start + ring.capacity() as u64)),
    }
}

/// Search both ways from the undelimited unit `sequence`; claims only once both
/// ends are present. Resolves to `(start, end)`.
pub fn claiming_undelimited_search(ring: &SlotRing, sequence: u64) -> Result<Claim<(u64, u64)>> {
    let leading = search_leading(ring, sequence);
    let trailing = search_trailing(ring, sequence);
    match (leading, trailing) {
        (
            Boundary::Found {
                distance: back,
                trailing_known,
            },
            Boundary::Found { distance: ahead, .. },
        ) => {
            if !trailing_known {
                return Ok(Claim::OutOfRange);
            }
            let start = sequence - back;
            let end = sequence + ahead;
            Ok(claim_span(ring, start).map(|()| (start, end)))
        }
        (Boundary::CapacityExceeded, _) | (_, Boundary::CapacityExceeded) => {
            let start = leading
                .distance()
                .map_or(sequence.saturating_sub(ring.capacity() as u64), |d| sequence - d);
            let end = trailing
                .distance()
                .map_or(sequence + ring.capacity() as u64, |d| sequence + d);
            Err(exceeded(ring, start, end))
        }
        _ => Ok(Claim::OutOfRange),
    }
}

/// Move every fragment of the claimed span `[start, end]` out of the ring.
///
/// Only the winner of [`claim_span`] for `start` may call this. Interior slots
/// are taken unconditionally: nothing else can reach them without passing the
/// same gate.
pub fn claim_st_buffers(ring: &SlotRing, start: u64, end: u64) -> SpanningRecord {
    debug_assert!(start < end);
    let mut fragments = Vec::with_capacity((end - start + 1) as usize);

    let (first, _) = ring.slot_for(start);
    fragments.extend(first.take_trailing());

    for sequence in start + 1..end {
        let (slot, _generation) = ring.slot_for(sequence);
        debug_assert!(slot.load().is_installed_at(_generation));
        fragments.extend(slot.take_leading());
    }

    let (last, _) = ring.slot_for(end);
    fragments.extend(last.take_leading());

    debug!(start, end, units = fragments.len(), "claimed spanning record");
    SpanningRecord {
        start,
        end,
        fragments,
    }
}

fn exceeded(ring: &SlotRing, start: u64, end: u64) -> FormatError {
    FormatError::CapacityExceeded {
        start,
        end,
        capacity: ring.capacity(),
    }
}
