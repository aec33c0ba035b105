// Bit layout of the per-slot state word.
//
// Generation and flags share one AtomicU64 so that a reader can never pair a
// generation with flags belonging to a different occupant.
//
//   [63 .. 8] generation (1-based; 0 = slot never used)
//   [7]       unused
//   [6]       SYNTHETIC          stream-start sentinel or flush marker, no payload bytes
//   [5]       TRAILING_RELEASED  trailing fragment moved out of the ring
//   [4]       TRAILING_CLAIMED   span starting here has been claimed (the claim gate)
//   [3]       LEADING_RELEASED   leading fragment (or the whole undelimited unit) moved out
//   [2]       TRAILING_KNOWN     offset of the last delimiter has been recorded
//   [1]       HAS_DELIMITER
//   [0]       INSTALLED          payload published; clear while an install is in flight

pub const INSTALLED: u64 = 1 << 0;
pub const HAS_DELIMITER: u64 = 1 << 1;
pub const TRAILING_KNOWN: u64 = 1 << 2;
pub const LEADING_RELEASED: u64 = 1 << 3;
pub const TRAILING_CLAIMED: u64 = 1 << 4;
pub const TRAILING_RELEASED: u64 = 1 << 5;
pub const SYNTHETIC: u64 = 1 << 6;

pub const FLAG_BITS: u32 = 8;
pub const FLAG_MASK: u64 = (1 << FLAG_BITS) - 1;

/// Largest generation representable in the state word.
pub const MAX_GENERATION: u64 = u64::MAX >> FLAG_BITS;

/// A decoded copy of a slot state word.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct SlotState(pub u64);

impl SlotState {
    pub const EMPTY: SlotState = SlotState(0);

    #[inline]
    pub fn new(generation: u64, flags: u64) -> Self {
        debug_assert!(generation <= MAX_GENERATION);
        SlotState((generation << FLAG_BITS) | (flags & FLAG_MASK))
    }

    #[inline]
    pub fn generation(self) -> u64 {
        self.0 >> FLAG_BITS
    }

    #[inline]
    pub fn flags(self) -> u64 {
        self.0 & FLAG_MASK
    }

    #[inline]
    pub fn has(self, flag: u64) -> bool {
        self.0 & flag == flag
    }

    #[inline]
    pub fn with(self, flag: u64) -> Self {
        SlotState(self.0 | flag)
    }

    #[inline]
    pub fn is_installed(self) -> bool {
        self.has(INSTALLED)
    }

    #[inline]
    pub fn has_delimiter(self) -> bool {
        self.has(HAS_DELIMITER)
    }

    /// Installed for exactly `generation`.
    #[inline]
    pub fn is_installed_at(self, generation: u64) -> bool {
        self.generation() == generation && self.is_installed()
    }

    /// Every use of the occupant has been moved out of the ring.
    #[inline]
    pub fn is_released(self) -> bool {
        if !self.is_installed() || !self.has(LEADING_RELEASED) {
            return false;
        }
        !self.has_delimiter() || self.has(TRAILING_RELEASED)
    }

    /// The slot may take a new occupant.
    #[inline]
    pub fn is_free(self) -> bool {
        self.generation() == 0 || self.is_released()
    }

    /// Can start a span right now: delimited, trailing boundary known, gate still open.
    #[inline]
    pub fn can_start_span(self) -> bool {
        self.is_installed()
            && self.has_delimiter()
            && self.has(TRAILING_KNOWN)
            && !self.has(TRAILING_CLAIMED)
    }
}
