// Fixed-size array of generation-stamped slots addressed by unbounded sequence numbers.

use crossbeam_utils::CachePadded;

use super::layout::{SlotState, HAS_DELIMITER, TRAILING_KNOWN};
use super::Slot_Structs::{Slot, SlotPayload, TrySet};
use crate::Core::error::Result;
use crate::STBuffer::Structs::SequencedUnit;

/// The ring of slots.
///
/// `capacity` is fixed at construction. It bounds both how far out of order a
/// unit may arrive and how many units a single record may span.
pub struct SlotRing {
    slots: Box<[CachePadded<Slot>]>,
    capacity: usize,
}

impl SlotRing {
    pub fn new(capacity: usize) -> Self {
        let slots: Vec<CachePadded<Slot>> =
            (0..capacity).map(|_| CachePadded::new(Slot::new())).collect();
        Self {
            slots: slots.into_boxed_slice(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Map a sequence number to its slot index and 1-based generation.
    #[inline]
    pub fn index_and_generation(&self, sequence: u64) -> (usize, u64) {
        let capacity = self.capacity as u64;
        ((sequence % capacity) as usize, sequence / capacity + 1)
    }

    /// Inverse of [`index_and_generation`](Self::index_and_generation).
    #[inline]
    pub fn sequence_at(&self, index: usize, generation: u64) -> u64 {
        (generation - 1) * self.capacity as u64 + index as u64
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    /// Slot and expected generation for `sequence`.
    #[inline]
    pub fn slot_for(&self, sequence: u64) -> (&Slot, u64) {
        let (index, generation) = self.index_and_generation(sequence);
        (self.slot(index), generation)
    }

    /// Current state of the slot holding (or awaiting) `sequence`.
    #[inline]
    pub fn state_of(&self, sequence: u64) -> SlotState {
        self.slot_for(sequence).0.load()
    }

    pub fn try_set_with_delimiter(&self, index: usize, generation: u64, unit: &SequencedUnit) -> TrySet {
        debug_assert!(unit.has_delimiter());
        let trailing_known = unit.delimiters().and_then(|o| o.last).is_some();
        let mut flags = HAS_DELIMITER;
        if trailing_known {
            flags |= TRAILING_KNOWN;
        }
        self.slot(index)
            .try_install(generation, SlotPayload::from_unit(unit), flags)
    }

    pub fn try_set_without_delimiter(&self, index: usize, generation: u64, unit: &SequencedUnit) -> TrySet {
        debug_assert!(!unit.has_delimiter());
        self.slot(index)
            .try_install(generation, SlotPayload::from_unit(unit), 0)
    }

    /// Install a synthetic delimited occupant with `preset` flags already applied.
    pub(crate) fn try_set_synthetic(
        &self,
        index: usize,
        generation: u64,
        payload: SlotPayload,
        preset: u64,
    ) -> TrySet {
        self.slot(index).try_install(generation, payload, preset)
    }

    /// Record where the last complete record inside an installed delimited unit ends.
    pub fn set_trailing_offset(&self, index: usize, generation: u64, offset: u32) -> Result<()> {
        let sequence = self.sequence_at(index, generation);
        self.slot(index).set_trailing_offset(generation, sequence, offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots.iter().enumerate().map(|(i, s)| (i, &**s))
    }
}
