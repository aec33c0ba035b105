use bytes::Bytes;
use tracing::{trace, warn};

use crate::Core::error::Result;
use crate::Core::scan::{check_unit_len, split_records};
use crate::STBuffer::{Claim, SequencedUnit, SpanningRecord, SpanningTupleBuffer};

/// One logical record with its tuple delimiter stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// The unit holding the record's last byte.
    pub sequence: u64,
    /// Offset of the terminating delimiter inside unit `sequence`; `u32::MAX`
    /// for a final record that ends without one.
    pub offset: u32,
    pub bytes: Bytes,
    field_delimiter: u8,
}

impl Record {
    /// Split on the field delimiter. Fields stay raw bytes; typing them is the
    /// parser's job.
    pub fn fields(&self) -> Vec<Bytes> {
        let mut fields = Vec::new();
        let mut start = 0;
        for end in memchr::memchr_iter(self.field_delimiter, &self.bytes) {
            fields.push(self.bytes.slice(start..end));
            start = end + 1;
        }
        fields.push(self.bytes.slice(start..));
        fields
    }
}

/// Turns raw units into records, in whatever order the units arrive.
///
/// `&self` throughout: one formatter is shared by all workers.
pub struct InputFormatter {
    buffer: SpanningTupleBuffer,
}

impl InputFormatter {
    pub(crate) fn new(buffer: SpanningTupleBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &SpanningTupleBuffer {
        &self.buffer
    }

    /// Format the unit `sequence` and return every record it completes: the
    /// record it closes, the records it holds entirely, then the record it
    /// opens (if the units after it are already there).
    ///
    /// `WouldBlock` leaves no trace in the buffer; submit the same unit again.
    pub fn format(&self, sequence: u64, data: impl Into<Bytes>) -> Result<Vec<Record>> {
        let data = data.into();
        check_unit_len(sequence, data.len())?;
        if data.is_empty() {
            warn!(sequence, "received empty unit");
        }
        let unit = SequencedUnit::scan(sequence, data, self.buffer.tuple_delimiter());
        let resolution = self.buffer.process(&unit)?;

        let mut records = Vec::new();
        if let Claim::Resolved(span) = resolution.leading {
            self.push_span(&mut records, span);
        }
        if let (Some(complete), Some(offsets)) = (resolution.complete, unit.delimiters()) {
            let mut offset = offsets.first + 1;
            for bytes in split_records(complete, self.buffer.tuple_delimiter()) {
                let end = offset + bytes.len() as u32;
                records.push(self.record(sequence, end, bytes));
                offset = end + 1;
            }
        }
        if let Claim::Resolved(span) = resolution.trailing {
            self.push_span(&mut records, span);
        }
        trace!(sequence, records = records.len(), "unit formatted");
        Ok(records)
    }

    /// End the stream at `next_sequence`: emit the record left open by the last
    /// unit, then check the buffer.
    ///
    /// If units before `next_sequence` are still missing, the final record is
    /// produced by the [`format`](Self::format) call that delivers the last of them.
    pub fn finish(&self, next_sequence: u64) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        match self.buffer.flush(next_sequence)? {
            Claim::Resolved(span) => self.push_span(&mut records, span),
            _ => {
                let pending = self.buffer.unresolved();
                warn!(next_sequence, ?pending, "final record waits on missing units");
            }
        }
        if !self.buffer.validate() {
            warn!(next_sequence, "buffer inconsistent at end of stream");
        }
        Ok(records)
    }

    fn push_span(&self, records: &mut Vec<Record>, span: SpanningRecord) {
        let (sequence, tail) = span
            .fragments()
            .last()
            .map_or((span.end(), 0), |fragment| (fragment.sequence, fragment.bytes.len()));
        let mut bytes = span.to_bytes();
        let offset = if bytes.last() == Some(&self.buffer.tuple_delimiter()) {
            bytes.truncate(bytes.len() - 1);
            // the closing fragment runs up to and including the first delimiter
            tail as u32 - 1
        } else if bytes.is_empty() {
            // stream ended right after a delimiter
            return;
        } else {
            u32::MAX
        };
        records.push(self.record(sequence, offset, bytes));
    }

    fn record(&self, sequence: u64, offset: u32, bytes: Bytes) -> Record {
        Record {
            sequence,
            offset,
            bytes,
            field_delimiter: self.buffer.field_delimiter(),
        }
    }
}
