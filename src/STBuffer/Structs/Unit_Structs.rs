// Value types exchanged with the sources (upstream) and the record parser (downstream).

use bytes::{Bytes, BytesMut};

use crate::Core::error::{FormatError, Result};

/// Byte offsets of the first and last tuple delimiter inside a unit.
///
/// Offsets are `u32`, which caps a unit at
/// [`MAX_UNIT_LEN`](crate::Core::scan::MAX_UNIT_LEN) bytes.
/// `last` is `None` while the trailing boundary is still unknown; it is
/// recorded later through
/// [`SpanningTupleBuffer::try_find_trailing_span_for_delimited_unit`](crate::STBuffer::SpanningTupleBuffer::try_find_trailing_span_for_delimited_unit).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DelimiterOffsets {
    pub first: u32,
    pub last: Option<u32>,
}

/// One raw input buffer as produced by a source: payload plus the sequence
/// number the source assigned to it.
#[derive(Clone, Debug)]
pub struct SequencedUnit {
    sequence: u64,
    data: Bytes,
    delimiters: Option<DelimiterOffsets>,
}

impl SequencedUnit {
    /// Create a unit with caller-supplied delimiter offsets.
    pub fn new(
        sequence: u64,
        data: impl Into<Bytes>,
        delimiters: Option<DelimiterOffsets>,
    ) -> Result<Self> {
        let data = data.into();
        crate::Core::scan::check_unit_len(sequence, data.len())?;
        if let Some(offsets) = delimiters {
            let len = data.len();
            let first_ok = (offsets.first as usize) < len;
            let last_ok = offsets
                .last
                .map_or(true, |last| last >= offsets.first && (last as usize) < len);
            if !first_ok || !last_ok {
                return Err(FormatError::InvalidOffsets {
                    sequence,
                    first: offsets.first,
                    last: offsets.last,
                    len,
                });
            }
        }
        Ok(Self {
            sequence,
            data,
            delimiters,
        })
    }

    /// A unit holding at least one tuple delimiter, the first at `first`.
    /// `last` may be left open and recorded later.
    pub fn delimited(
        sequence: u64,
        data: impl Into<Bytes>,
        first: u32,
        last: Option<u32>,
    ) -> Result<Self> {
        Self::new(sequence, data, Some(DelimiterOffsets { first, last }))
    }

    /// Create a unit by scanning `data` for `tuple_delimiter`.
    ///
    /// `data` must fit [`MAX_UNIT_LEN`](crate::Core::scan::MAX_UNIT_LEN);
    /// callers holding unchecked input go through
    /// [`check_unit_len`](crate::Core::scan::check_unit_len) first.
    pub fn scan(sequence: u64, data: impl Into<Bytes>, tuple_delimiter: u8) -> Self {
        let data = data.into();
        let delimiters = crate::Core::scan::delimiter_offsets(&data, tuple_delimiter);
        Self {
            sequence,
            data,
            delimiters,
        }
    }

    /// A unit without any tuple delimiter.
    pub fn undelimited(sequence: u64, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            data: data.into(),
            delimiters: None,
        }
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn delimiters(&self) -> Option<DelimiterOffsets> {
        self.delimiters
    }

    #[inline]
    pub fn has_delimiter(&self) -> bool {
        self.delimiters.is_some()
    }

    /// The records that begin and end inside this unit: everything after the
    /// first delimiter up to and including the last one.
    ///
    /// `None` for undelimited units and for units whose last delimiter is not
    /// known yet. Empty when the unit holds a single delimiter.
    pub fn complete_records(&self) -> Option<Bytes> {
        let offsets = self.delimiters?;
        let last = offsets.last?;
        Some(self.data.slice(offsets.first as usize + 1..last as usize + 1))
    }
}

/// The bytes one unit contributes to a spanning record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub sequence: u64,
    pub bytes: Bytes,
}

/// A record whose bytes cross unit boundaries.
///
/// `start` and `end` are the sequence numbers of the delimited units bounding
/// the record. `fragments` are ascending by sequence number; the synthetic
/// units the ring uses as stream start and flush markers contribute none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpanningRecord {
    pub(crate) start: u64,
    pub(crate) end: u64,
    pub(crate) fragments: Vec<Fragment>,
}

impl SpanningRecord {
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.fragments.iter().map(|f| f.sequence).collect()
    }

    /// Number of units contributing bytes.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.bytes.is_empty())
    }

    /// Concatenate the fragments into the contiguous record bytes.
    pub fn to_bytes(&self) -> Bytes {
        if let [single] = self.fragments.as_slice() {
            return single.bytes.clone();
        }
        let total = self.fragments.iter().map(|f| f.bytes.len()).sum();
        let mut out = BytesMut::with_capacity(total);
        for fragment in &self.fragments {
            out.extend_from_slice(&fragment.bytes);
        }
        out.freeze()
    }
}

/// Outcome of a claiming search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claim<T> {
    /// This caller won the span and owns its contents.
    Resolved(T),
    /// A neighbour needed to bound the span has not been installed yet.
    /// Whichever unit completes the span later resolves it.
    OutOfRange,
    /// Another caller already claimed the span.
    ClaimedElsewhere,
}

impl<T> Claim<T> {
    pub fn resolved(self) -> Option<T> {
        match self {
            Claim::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Claim::Resolved(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Claim<U> {
        match self {
            Claim::Resolved(value) => Claim::Resolved(f(value)),
            Claim::OutOfRange => Claim::OutOfRange,
            Claim::ClaimedElsewhere => Claim::ClaimedElsewhere,
        }
    }
}

/// Everything one call to
/// [`SpanningTupleBuffer::process`](crate::STBuffer::SpanningTupleBuffer::process)
/// hands back for a unit.
#[derive(Clone, Debug)]
pub struct Resolution {
    /// Span ending in this unit (delimited units) or containing it (undelimited units).
    pub leading: Claim<SpanningRecord>,
    /// The unit's own complete records; `None` for undelimited units.
    pub complete: Option<Bytes>,
    /// Span starting in this unit. Never resolved for undelimited units, whose
    /// single span is reported in `leading`.
    pub trailing: Claim<SpanningRecord>,
}

impl Resolution {
    /// The spans this call won, in ascending sequence order.
    pub fn spans(self) -> Vec<SpanningRecord> {
        let mut spans = Vec::with_capacity(2);
        if let Claim::Resolved(span) = self.leading {
            spans.push(span);
        }
        if let Claim::Resolved(span) = self.trailing {
            spans.push(span);
        }
        spans
    }
}
