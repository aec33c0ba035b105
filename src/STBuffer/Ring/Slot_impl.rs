use parking_lot::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;

use super::layout::{
    SlotState, HAS_DELIMITER, INSTALLED, LEADING_RELEASED, SYNTHETIC, TRAILING_CLAIMED,
    TRAILING_KNOWN, TRAILING_RELEASED,
};
use super::Slot_Structs::{ClaimGate, Slot, SlotPayload, TrySet};
use crate::Core::error::{FormatError, Result};
use crate::STBuffer::Structs::Fragment;

impl Slot {
    pub fn new() -> Self {
        Self {
            state: AtomicU64::new(SlotState::EMPTY.0),
            payload: Mutex::new(SlotPayload::default()),
        }
    }

    #[inline]
    pub fn load(&self) -> SlotState {
        SlotState(self.state.load(SeqCst))
    }

    /// Install `payload` as the occupant for `generation` iff the slot is free.
    ///
    /// The slot is first reserved (generation written, `INSTALLED` clear) so that
    /// a concurrent duplicate sees `Duplicate`, then the payload is written, then
    /// `INSTALLED` and `flags` are published together.
    pub(crate) fn try_install(&self, generation: u64, payload: SlotPayload, flags: u64) -> TrySet {
        loop {
            let current = self.load();
            let current_generation = current.generation();
            if current_generation == generation {
                return TrySet::Duplicate { current: current.0 };
            }
            if current_generation > generation {
                return TrySet::Stale { current: current.0 };
            }
            if !current.is_free() {
                return TrySet::Occupied { current: current.0 };
            }

            let reserved = SlotState::new(generation, 0);
            if self
                .state
                .compare_exchange(current.0, reserved.0, SeqCst, SeqCst)
                .is_ok()
            {
                break;
            }
            // state moved under us, re-evaluate
            std::hint::spin_loop();
        }

        *self.payload.lock() = payload;
        // Publish
        self.state.fetch_or(flags | INSTALLED, SeqCst);
        TrySet::Installed
    }

    /// Record the offset of the occupant's last delimiter and publish `TRAILING_KNOWN`.
    pub(crate) fn set_trailing_offset(&self, generation: u64, sequence: u64, offset: u32) -> Result<()> {
        let state = self.load();
        if !state.is_installed_at(generation) {
            return Err(FormatError::NotInstalled { sequence });
        }
        if !state.has_delimiter() || state.has(SYNTHETIC) {
            return Err(FormatError::NotDelimited { sequence });
        }

        {
            let mut payload = self.payload.lock();
            let first = payload.first.unwrap_or(0);
            let len = payload.data.as_ref().map_or(0, |d| d.len());
            if let Some(last) = payload.last {
                if last == offset {
                    return Ok(());
                }
                return Err(FormatError::InvalidOffsets {
                    sequence,
                    first,
                    last: Some(offset),
                    len,
                });
            }
            if offset < first || offset as usize >= len {
                return Err(FormatError::InvalidOffsets {
                    sequence,
                    first,
                    last: Some(offset),
                    len,
                });
            }
            payload.last = Some(offset);
        }

        self.state.fetch_or(TRAILING_KNOWN, SeqCst);
        Ok(())
    }

    /// Atomically claim the span that starts at this slot.
    ///
    /// Succeeds for exactly one caller per `(slot, generation)`.
    pub fn try_claim_span(&self, generation: u64) -> ClaimGate {
        loop {
            let current = self.load();
            if !current.is_installed_at(generation) {
                return ClaimGate::Vanished;
            }
            if current.has(TRAILING_CLAIMED) {
                return ClaimGate::AlreadyClaimed;
            }
            if !current.can_start_span() {
                return ClaimGate::NotReady;
            }
            let claimed = current.with(TRAILING_CLAIMED);
            if self
                .state
                .compare_exchange(current.0, claimed.0, SeqCst, SeqCst)
                .is_ok()
            {
                return ClaimGate::Won;
            }
            // a release bit or TRAILING_KNOWN changed concurrently, retry
            std::hint::spin_loop();
        }
    }

    /// Move out the bytes that close the record ending here: up to and including
    /// the first delimiter, or the whole unit if it has none.
    ///
    /// Returns `None` for synthetic occupants.
    pub(crate) fn take_leading(&self) -> Option<Fragment> {
        let fragment = {
            let mut payload = self.payload.lock();
            debug_assert!(!payload.leading_taken, "leading fragment taken twice");
            payload.leading_taken = true;
            let fragment = payload.data.as_ref().map(|data| {
                let bytes = match payload.first {
                    Some(first) => data.slice(..first as usize + 1),
                    None => data.clone(),
                };
                Fragment {
                    sequence: payload.sequence,
                    bytes,
                }
            });
            if payload.first.is_none() || payload.trailing_taken {
                payload.data = None;
            }
            fragment
        };
        self.state.fetch_or(LEADING_RELEASED, SeqCst);
        fragment
    }

    /// Move out the bytes after the last delimiter, which open the record
    /// starting here. Only called by the winner of [`try_claim_span`](Self::try_claim_span).
    pub(crate) fn take_trailing(&self) -> Option<Fragment> {
        let fragment = {
            let mut payload = self.payload.lock();
            debug_assert!(!payload.trailing_taken, "trailing fragment taken twice");
            payload.trailing_taken = true;
            let last = payload.last;
            let fragment = match (payload.data.as_ref(), last) {
                (Some(data), Some(last)) => Some(Fragment {
                    sequence: payload.sequence,
                    bytes: data.slice(last as usize + 1..),
                }),
                _ => None,
            };
            if payload.leading_taken {
                payload.data = None;
            }
            fragment
        };
        self.state.fetch_or(TRAILING_RELEASED, SeqCst);
        fragment
    }

    /// Sequence number of the occupant as recorded in the payload.
    pub(crate) fn payload_sequence(&self) -> u64 {
        self.payload.lock().sequence
    }

    /// Whether the payload agrees with the release bits of `state`.
    pub(crate) fn payload_consistent(&self, state: SlotState) -> bool {
        let payload = self.payload.lock();
        if state.generation() == 0 {
            return payload.data.is_none();
        }
        if !state.is_installed() {
            // install in flight
            return false;
        }
        let leading_ok = state.has(LEADING_RELEASED) == payload.leading_taken;
        let trailing_ok = !state.has_delimiter() || state.has(TRAILING_RELEASED) == payload.trailing_taken;
        let data_ok = !state.is_released() || payload.data.is_none();
        let delimiter_ok = state.has(HAS_DELIMITER) == payload.first.is_some();
        leading_ok && trailing_ok && data_ok && delimiter_ok
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}
