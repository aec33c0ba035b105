mod buffer;
mod builder;
mod debug;

pub mod claim;
pub mod search;

pub use buffer::SpanningTupleBuffer;
pub use builder::STBufferBuilder;
pub use Structs::{Claim, DelimiterOffsets, Fragment, Resolution, SequencedUnit, SpanningRecord};

pub mod Ring {
    pub mod layout;
    pub mod Ring;
    pub mod Slot_Structs;
    pub mod Slot_impl;
    pub use self::Ring::SlotRing; // re-export for stable path
    pub(crate) use self::Slot_Structs::SlotPayload;
    pub use self::Slot_Structs::{ClaimGate, Slot, TrySet};
}

pub mod Structs {
    pub mod Unit_Structs;
    pub use Unit_Structs::{
        Claim, DelimiterOffsets, Fragment, Resolution, SequencedUnit, SpanningRecord,
    }; // re-export for stable path
}
