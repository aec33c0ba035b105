/// Errors surfaced by the spanning-tuple buffer and the formatter on top of it.
///
/// Missing neighbours are not errors: they come back as
/// [`Claim::OutOfRange`](crate::STBuffer::Claim::OutOfRange).
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The slot for `sequence` is still waiting on `occupant`, the unit one lap
    /// earlier, to arrive or to be resolved. Re-submit the unit later.
    #[error("sequence {sequence} cannot be installed yet: slot {index} is still waiting on sequence {occupant}")]
    WouldBlock {
        sequence: u64,
        index: usize,
        occupant: u64,
    },

    /// A record covers more sequence numbers than the ring can hold at once.
    #[error("spanning record from sequence {start} to {end} exceeds ring capacity {capacity}")]
    CapacityExceeded {
        start: u64,
        end: u64,
        capacity: usize,
    },

    /// Caller-supplied delimiter offsets do not fit the unit.
    #[error("invalid delimiter offsets for sequence {sequence}: first {first}, last {last:?}, unit length {len}")]
    InvalidOffsets {
        sequence: u64,
        first: u32,
        last: Option<u32>,
        len: usize,
    },

    /// Delimiter offsets are `u32`; longer units cannot be addressed.
    #[error("unit {sequence} is {len} bytes, more than the {max} a unit may hold")]
    UnitTooLarge {
        sequence: u64,
        len: usize,
        max: usize,
    },

    #[error("sequence {sequence} is not installed in the ring")]
    NotInstalled { sequence: u64 },

    #[error("sequence {sequence} does not hold a tuple delimiter")]
    NotDelimited { sequence: u64 },

    #[error("sequence {sequence} holds a tuple delimiter")]
    UnexpectedDelimiter { sequence: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("formatter pool has shut down")]
    ShutDown,
}

impl FormatError {
    /// True for conditions the caller resolves by submitting the same unit again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FormatError::WouldBlock { .. })
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;
