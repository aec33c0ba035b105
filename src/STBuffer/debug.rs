use std::fmt;

use super::Ring::layout::SlotState;
use super::Ring::{Slot, SlotRing};
use super::SpanningTupleBuffer;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for SpanningTupleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_spanning_tuple_buffer(self, f)
    }
}

impl fmt::Debug for SlotRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_slot_ring(self, f)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_slot(self, f)
    }
}

impl fmt::Debug for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_slot_state(*self, f)
    }
}
