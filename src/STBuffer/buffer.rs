// The reconstruction buffer: installs units into the ring, discovers the spans
// they complete and hands every span out exactly once.

use tracing::{debug, error, trace, warn};

use super::claim::{
    claim_st_buffers, claiming_leading_delimiter_search, claiming_trailing_delimiter_search,
    claiming_undelimited_search,
};
use super::Ring::layout::{
    SlotState, HAS_DELIMITER, LEADING_RELEASED, MAX_GENERATION, SYNTHETIC, TRAILING_CLAIMED,
    TRAILING_KNOWN, TRAILING_RELEASED,
};
use super::Ring::{Slot, SlotPayload, SlotRing, TrySet};
use super::Structs::{Claim, Resolution, SequencedUnit, SpanningRecord};
use crate::Core::error::{FormatError, Result};

/// Flags of the stream-start sentinel: a delimited unit whose trailing boundary
/// is known and which has nothing before it.
const SENTINEL_FLAGS: u64 = HAS_DELIMITER | TRAILING_KNOWN | LEADING_RELEASED | SYNTHETIC;

/// Flags of an end-of-stream marker: closes the last span, never opens one.
const MARKER_FLAGS: u64 =
    HAS_DELIMITER | TRAILING_KNOWN | TRAILING_CLAIMED | TRAILING_RELEASED | SYNTHETIC;

/// Reassembles records whose bytes cross the boundaries of out-of-order units.
///
/// Shared by every formatting worker (`&self` everywhere). A unit is installed
/// exactly once through one of the `try_find_*` entry points or [`process`](Self::process);
/// whichever unit completes a span last claims it and gets it back as a
/// [`SpanningRecord`]. Every other caller sees [`Claim::OutOfRange`] (a
/// neighbour is still missing) or [`Claim::ClaimedElsewhere`].
///
/// Built through [`STBufferBuilder`](super::STBufferBuilder).
pub struct SpanningTupleBuffer {
    pub(crate) ring: SlotRing,
    tuple_delimiter: u8,
    field_delimiter: u8,
    first_sequence: u64,
}

impl SpanningTupleBuffer {
    pub(crate) fn new(
        capacity: usize,
        tuple_delimiter: u8,
        field_delimiter: u8,
        first_sequence: u64,
    ) -> Result<Self> {
        let ring = SlotRing::new(capacity);

        let sentinel = first_sequence - 1;
        let (index, generation) = ring.index_and_generation(sentinel);
        let mut payload = SlotPayload::synthetic(sentinel);
        payload.leading_taken = true;
        match ring.try_set_synthetic(index, generation, payload, SENTINEL_FLAGS) {
            TrySet::Installed => {}
            other => {
                return Err(FormatError::InvalidConfig(format!(
                    "cannot place stream start sentinel at sequence {sentinel}: {other:?}"
                )))
            }
        }

        debug!(capacity, first_sequence, "spanning tuple buffer ready");
        Ok(Self {
            ring,
            tuple_delimiter,
            field_delimiter,
            first_sequence,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub fn tuple_delimiter(&self) -> u8 {
        self.tuple_delimiter
    }

    #[inline]
    pub fn field_delimiter(&self) -> u8 {
        self.field_delimiter
    }

    #[inline]
    pub fn first_sequence(&self) -> u64 {
        self.first_sequence
    }

    /// The underlying slot ring, for diagnostics and tests.
    pub fn ring(&self) -> &SlotRing {
        &self.ring
    }

    /// Install a delimited unit and claim the span it closes.
    ///
    /// `OutOfRange` means only that the span ending here is still missing a
    /// neighbour. The unit's own complete records never travel through the
    /// ring: take them from [`SequencedUnit::complete_records`], or use
    /// [`process`](Self::process), which returns them as `complete`.
    ///
    /// If the unit carries its last delimiter offset, the span it opens
    /// becomes claimable too, through
    /// [`try_find_trailing_span_for_delimited_unit`](Self::try_find_trailing_span_for_delimited_unit)
    /// or through whichever neighbour arrives last.
    pub fn try_find_leading_span_for_delimited_unit(
        &self,
        unit: &SequencedUnit,
    ) -> Result<Claim<SpanningRecord>> {
        if !unit.has_delimiter() {
            return Err(FormatError::NotDelimited {
                sequence: unit.sequence(),
            });
        }
        self.install(unit)?;
        self.leading_span(unit.sequence())
    }

    /// Claim the span opened by the already installed delimited unit `sequence`,
    /// recording its last delimiter offset first when given.
    pub fn try_find_trailing_span_for_delimited_unit(
        &self,
        sequence: u64,
        trailing_offset: Option<u32>,
    ) -> Result<Claim<SpanningRecord>> {
        let (index, generation) = self.ring.index_and_generation(sequence);
        let state = self.ring.slot(index).load();
        if state.generation() > generation {
            return Ok(Claim::ClaimedElsewhere);
        }
        if !state.is_installed_at(generation) {
            return Err(FormatError::NotInstalled { sequence });
        }
        if !state.has_delimiter() {
            return Err(FormatError::NotDelimited { sequence });
        }
        if let Some(offset) = trailing_offset {
            self.ring.set_trailing_offset(index, generation, offset)?;
        }
        self.trailing_span(sequence)
    }

    /// Install an undelimited unit and claim the span it lies inside.
    ///
    /// Resolves only once both the delimited unit before it and the one after it
    /// are present.
    pub fn try_find_span_for_undelimited_unit(
        &self,
        unit: &SequencedUnit,
    ) -> Result<Claim<SpanningRecord>> {
        if unit.has_delimiter() {
            return Err(FormatError::UnexpectedDelimiter {
                sequence: unit.sequence(),
            });
        }
        self.install(unit)?;
        self.undelimited_span(unit.sequence())
    }

    /// Install `unit` and collect everything it completes.
    pub fn process(&self, unit: &SequencedUnit) -> Result<Resolution> {
        let sequence = unit.sequence();
        self.install(unit)?;
        if unit.has_delimiter() {
            let leading = self.leading_span(sequence)?;
            let trailing = self.trailing_span(sequence)?;
            Ok(Resolution {
                leading,
                complete: unit.complete_records(),
                trailing,
            })
        } else {
            Ok(Resolution {
                leading: self.undelimited_span(sequence)?,
                complete: None,
                trailing: Claim::OutOfRange,
            })
        }
    }

    /// Re-run the searches for an installed unit without installing it again.
    ///
    /// Units whose every use has been handed out report `ClaimedElsewhere` on
    /// both sides.
    pub fn resolve(&self, sequence: u64) -> Result<Resolution> {
        let (slot, generation) = self.ring.slot_for(sequence);
        let state = slot.load();
        let done = state.generation() > generation
            || (state.generation() == generation && state.is_released());
        if done {
            return Ok(Resolution {
                leading: Claim::ClaimedElsewhere,
                complete: None,
                trailing: Claim::ClaimedElsewhere,
            });
        }
        if !state.is_installed_at(generation) {
            return Err(FormatError::NotInstalled { sequence });
        }

        if state.has_delimiter() {
            Ok(Resolution {
                leading: self.leading_span(sequence)?,
                complete: None,
                trailing: self.trailing_span(sequence)?,
            })
        } else {
            Ok(Resolution {
                leading: self.undelimited_span(sequence)?,
                complete: None,
                trailing: Claim::OutOfRange,
            })
        }
    }

    /// Whether the slot for `sequence` would accept it right now.
    pub fn is_in_range(&self, sequence: u64) -> bool {
        if sequence < self.first_sequence {
            return false;
        }
        let (index, generation) = self.ring.index_and_generation(sequence);
        let state = self.ring.slot(index).load();
        let lap_ready = self.predecessor(sequence).is_none() || state.generation() + 1 >= generation;
        lap_ready && state.generation() < generation && state.is_free()
    }

    /// Mark `next_sequence` as the end of the stream.
    ///
    /// Installs a delimited marker without bytes, which closes the record left
    /// open by the last unit. Resolves to that final record (possibly empty) if
    /// every unit before the marker has arrived; otherwise the unit that fills
    /// the last gap claims it. No unit may be submitted at or after
    /// `next_sequence` afterwards.
    pub fn flush(&self, next_sequence: u64) -> Result<Claim<SpanningRecord>> {
        self.install_with(next_sequence, |index, generation| {
            let mut payload = SlotPayload::synthetic(next_sequence);
            payload.trailing_taken = true;
            self.ring
                .try_set_synthetic(index, generation, payload, MARKER_FLAGS)
        })?;
        debug!(next_sequence, "end of stream marker installed");
        self.leading_span(next_sequence)
    }

    /// Sequence numbers of the units the ring still owns, ascending.
    pub fn unresolved(&self) -> Vec<u64> {
        let mut pending: Vec<u64> = self
            .ring
            .iter()
            .filter_map(|(index, slot)| {
                let state = slot.load();
                if state.generation() == 0 || state.is_released() || state.has(SYNTHETIC) {
                    return None;
                }
                Some(self.ring.sequence_at(index, state.generation()))
            })
            .collect();
        pending.sort_unstable();
        pending
    }

    /// Check every slot for consistency between its state word and payload.
    ///
    /// Meant for quiescent rings (tests, shutdown): an install in flight counts
    /// as inconsistent. Unresolved units are logged but are not a failure.
    pub fn validate(&self) -> bool {
        let mut consistent = true;
        let mut pending = 0usize;
        for (index, slot) in self.ring.iter() {
            let state = slot.load();
            if let Some(problem) = self.check_slot(index, slot, state) {
                warn!(index, ?state, problem, "inconsistent slot");
                consistent = false;
            } else if state.generation() != 0 && !state.is_released() && !state.has(SYNTHETIC) {
                pending += 1;
            }
        }
        if pending > 0 {
            warn!(pending, "slots still hold unresolved units");
        }
        consistent
    }

    fn check_slot(&self, index: usize, slot: &Slot, state: SlotState) -> Option<&'static str> {
        if state.generation() == 0 {
            if state.flags() != 0 || !slot.payload_consistent(state) {
                return Some("unused slot carries state");
            }
            return None;
        }
        if !state.is_installed() {
            return Some("install in flight");
        }
        let sequence = self.ring.sequence_at(index, state.generation());
        if sequence + 1 < self.first_sequence {
            return Some("occupant precedes the stream start");
        }
        if slot.payload_sequence() != sequence {
            return Some("payload belongs to another sequence");
        }
        if state.has(TRAILING_KNOWN) && !state.has_delimiter() {
            return Some("trailing offset on an undelimited unit");
        }
        if state.has(TRAILING_CLAIMED) && !state.has(TRAILING_KNOWN) {
            return Some("span claimed before its start was known");
        }
        if state.has(TRAILING_RELEASED) && !state.has(TRAILING_CLAIMED) {
            return Some("trailing fragment released without a claim");
        }
        if !slot.payload_consistent(state) {
            return Some("payload disagrees with release flags");
        }
        None
    }

    fn leading_span(&self, end: u64) -> Result<Claim<SpanningRecord>> {
        let claim = claiming_leading_delimiter_search(&self.ring, end)?
            .map(|start| claim_st_buffers(&self.ring, start, end));
        Ok(self.settle(end, claim, LEADING_RELEASED))
    }

    fn trailing_span(&self, start: u64) -> Result<Claim<SpanningRecord>> {
        if !self.ring.state_of(start).has(TRAILING_KNOWN) {
            return Ok(self.settle(start, Claim::OutOfRange, TRAILING_CLAIMED));
        }
        let claim = claiming_trailing_delimiter_search(&self.ring, start)?
            .map(|end| claim_st_buffers(&self.ring, start, end));
        Ok(self.settle(start, claim, TRAILING_CLAIMED))
    }

    fn undelimited_span(&self, sequence: u64) -> Result<Claim<SpanningRecord>> {
        let claim = claiming_undelimited_search(&self.ring, sequence)?
            .map(|(start, end)| claim_st_buffers(&self.ring, start, end));
        Ok(self.settle(sequence, claim, LEADING_RELEASED))
    }

    /// A missing neighbour only matters while the unit's own use is still open.
    fn settle(&self, sequence: u64, claim: Claim<SpanningRecord>, flag: u64) -> Claim<SpanningRecord> {
        match claim {
            Claim::OutOfRange => {
                let (slot, generation) = self.ring.slot_for(sequence);
                let state = slot.load();
                let taken = state.generation() > generation
                    || (state.generation() == generation && state.has(flag));
                if taken {
                    Claim::ClaimedElsewhere
                } else {
                    Claim::OutOfRange
                }
            }
            other => other,
        }
    }

    fn install(&self, unit: &SequencedUnit) -> Result<()> {
        self.install_with(unit.sequence(), |index, generation| {
            if unit.has_delimiter() {
                self.ring.try_set_with_delimiter(index, generation, unit)
            } else {
                self.ring.try_set_without_delimiter(index, generation, unit)
            }
        })
    }

    fn install_with(&self, sequence: u64, set: impl FnOnce(usize, u64) -> TrySet) -> Result<()> {
        if sequence < self.first_sequence {
            self.protocol_violation(sequence, "sequence precedes the start of the stream");
        }
        let (index, generation) = self.ring.index_and_generation(sequence);
        if generation > MAX_GENERATION {
            self.protocol_violation(sequence, "sequence number beyond the generation range of the ring");
        }

        if let Some(predecessor) = self.predecessor(sequence) {
            let state = self.ring.slot(index).load();
            if state.generation() + 1 < generation {
                trace!(sequence, predecessor, "unit one lap earlier has not arrived");
                return Err(FormatError::WouldBlock {
                    sequence,
                    index,
                    occupant: predecessor,
                });
            }
        }

        match set(index, generation) {
            TrySet::Installed => {
                trace!(sequence, index, generation, "unit installed");
                Ok(())
            }
            TrySet::Duplicate { .. } => {
                self.protocol_violation(sequence, "sequence number installed twice")
            }
            TrySet::Stale { .. } => {
                self.protocol_violation(sequence, "sequence number older than its slot's lap")
            }
            TrySet::Occupied { current } => Err(self.blocked(sequence, index, SlotState(current))),
        }
    }

    /// The sequence number that used the same slot one lap earlier, if that
    /// lap is part of the stream.
    fn predecessor(&self, sequence: u64) -> Option<u64> {
        sequence
            .checked_sub(self.ring.capacity() as u64)
            .filter(|&p| p + 1 >= self.first_sequence)
    }

    /// Tell a full ring apart from a record that can never fit.
    ///
    /// The occupant waits on a span running forward. If every unit between it
    /// and `sequence` is installed and undelimited, that span already covers
    /// more positions than the ring has.
    fn blocked(&self, sequence: u64, index: usize, occupant: SlotState) -> FormatError {
        let occupant_sequence = self.ring.sequence_at(index, occupant.generation());
        let pending_forward = occupant.is_installed()
            && (!occupant.has_delimiter() || !occupant.has(TRAILING_RELEASED));
        let overflowing = pending_forward
            && (occupant_sequence + 1..sequence).all(|between| {
                let (slot, generation) = self.ring.slot_for(between);
                let state = slot.load();
                state.is_installed_at(generation) && !state.has_delimiter()
            });

        if overflowing {
            warn!(
                start = occupant_sequence,
                end = sequence,
                capacity = self.capacity(),
                "record does not fit into the ring"
            );
            return FormatError::CapacityExceeded {
                start: occupant_sequence,
                end: sequence,
                capacity: self.capacity(),
            };
        }
        trace!(sequence, occupant = occupant_sequence, "slot still occupied");
        FormatError::WouldBlock {
            sequence,
            index,
            occupant: occupant_sequence,
        }
    }

    #[cold]
    fn protocol_violation(&self, sequence: u64, reason: &str) -> ! {
        error!(sequence, reason, "spanning tuple buffer driven incorrectly");
        panic!("{reason} (sequence {sequence}): {self:#?}");
    }
}
