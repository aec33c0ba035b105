// Read-only traversal of the ring towards the nearest delimited neighbour.

use tracing::trace;

use super::Ring::layout::TRAILING_KNOWN;
use super::Ring::SlotRing;

/// Outcome of a boundary search.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// A delimited occupant of the expected generation, `distance` positions away.
    /// `trailing_known` reports whether its last delimiter has been recorded.
    Found { distance: u64, trailing_known: bool },
    /// A position on the way has not been installed for the expected generation yet.
    OutOfRange,
    /// Every position within one lap holds an installed undelimited unit: the
    /// record is longer than the ring.
    CapacityExceeded,
}

impl Boundary {
    pub fn distance(self) -> Option<u64> {
        match self {
            Boundary::Found { distance, .. } => Some(distance),
            _ => None,
        }
    }
}

/// Walk backwards from `sequence` to the nearest delimited unit.
///
/// The expected generation of each visited position follows from its own
/// sequence number, so crossing index 0 lowers it by one. A generation
/// mismatch means the neighbour has not arrived (or the slot still holds an
/// older lap), never that an unrelated occupant may be used.
pub fn search_leading(ring: &SlotRing, sequence: u64) -> Boundary {
    let capacity = ring.capacity() as u64;
    let mut distance = 1;
    while distance < capacity {
        let Some(position) = sequence.checked_sub(distance) else {
            return Boundary::OutOfRange;
        };
        let (index, generation) = ring.index_and_generation(position);
        let state = ring.slot(index).load();
        if !state.is_installed_at(generation) {
            trace!(sequence, position, "leading search stopped at missing neighbour");
            return Boundary::OutOfRange;
        }
        if state.has_delimiter() {
            return Boundary::Found {
                distance,
                trailing_known: state.has(TRAILING_KNOWN),
            };
        }
        distance += 1;
    }
    Boundary::CapacityExceeded
}

/// Mirror image of [`search_leading`], walking towards higher sequence numbers.
pub fn search_trailing(ring: &SlotRing, sequence: u64) -> Boundary {
    let capacity = ring.capacity() as u64;
    let mut distance = 1;
    while distance < capacity {
        let Some(position) = sequence.checked_add(distance) else {
            return Boundary::OutOfRange;
        };
        let (index, generation) = ring.index_and_generation(position);
        let state = ring.slot(index).load();
        if !state.is_installed_at(generation) {
            trace!(sequence, position, "trailing search stopped at missing neighbour");
            return Boundary::OutOfRange;
        }
        if state.has_delimiter() {
            return Boundary::Found {
                distance,
                trailing_known: state.has(TRAILING_KNOWN),
            };
        }
        distance += 1;
    }
    Boundary::CapacityExceeded
}
