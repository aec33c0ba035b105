// Tuple delimiter detection for raw input units.

use bytes::Bytes;

use crate::Core::error::{FormatError, Result};
use crate::STBuffer::Structs::DelimiterOffsets;

/// Largest unit the ring accepts: delimiter offsets are stored as `u32`.
pub const MAX_UNIT_LEN: usize = u32::MAX as usize;

/// Reject units whose offsets would not fit a `u32`.
pub fn check_unit_len(sequence: u64, len: usize) -> Result<()> {
    if len > MAX_UNIT_LEN {
        return Err(FormatError::UnitTooLarge {
            sequence,
            len,
            max: MAX_UNIT_LEN,
        });
    }
    Ok(())
}

/// Locate the first and last tuple delimiter in `data`.
///
/// Returns `None` when the buffer holds no delimiter at all, i.e. it is the
/// interior of a record that started in an earlier unit. `data` must not be
/// longer than [`MAX_UNIT_LEN`].
pub fn delimiter_offsets(data: &[u8], delimiter: u8) -> Option<DelimiterOffsets> {
    debug_assert!(data.len() <= MAX_UNIT_LEN);
    let first = memchr::memchr(delimiter, data)?;
    // memrchr cannot miss once memchr found one
    let last = memchr::memrchr(delimiter, data).unwrap_or(first);
    Some(DelimiterOffsets {
        first: first as u32,
        last: Some(last as u32),
    })
}

/// Iterator over the complete records in a byte run, delimiter stripped.
///
/// Bytes after the final delimiter are not yielded; callers pass runs that end
/// in a delimiter (complete-record bodies or assembled spans).
pub struct RecordSplit {
    bytes: Bytes,
    delimiter: u8,
    position: usize,
}

impl Iterator for RecordSplit {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let rest = &self.bytes[self.position..];
        let end = memchr::memchr(self.delimiter, rest)?;
        let record = self.bytes.slice(self.position..self.position + end);
        self.position += end + 1;
        Some(record)
    }
}

pub fn split_records(bytes: Bytes, delimiter: u8) -> RecordSplit {
    RecordSplit {
        bytes,
        delimiter,
        position: 0,
    }
}
