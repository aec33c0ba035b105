use super::Ring::layout::MAX_GENERATION;
use super::SpanningTupleBuffer;
use crate::Core::error::{FormatError, Result};

pub struct STBufferBuilder {
    capacity: usize,
    tuple_delimiter: u8,
    field_delimiter: u8,
    first_sequence: u64,
}

impl Default for STBufferBuilder {
    fn default() -> Self {
        Self {
            capacity: 1024,
            tuple_delimiter: b'\n',
            field_delimiter: b',',
            first_sequence: 1, // sentinel takes sequence 0
        }
    }
}

impl STBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots. Bounds both the out-of-order distance and the number
    /// of units one record may span. Powers of two keep the modulo cheap.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_tuple_delimiter(mut self, delimiter: u8) -> Self {
        self.tuple_delimiter = delimiter;
        self
    }

    pub fn with_field_delimiter(mut self, delimiter: u8) -> Self {
        self.field_delimiter = delimiter;
        self
    }

    /// Sequence number of the first unit of the stream.
    pub fn with_first_sequence(mut self, sequence: u64) -> Self {
        self.first_sequence = sequence;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.capacity < 2 {
            return Err(FormatError::InvalidConfig(format!(
                "capacity must be at least 2, got {}",
                self.capacity
            )));
        }
        if self.first_sequence == 0 {
            return Err(FormatError::InvalidConfig(
                "first sequence must be at least 1".to_string(),
            ));
        }
        if (self.first_sequence - 1) / self.capacity as u64 >= MAX_GENERATION {
            return Err(FormatError::InvalidConfig(format!(
                "first sequence {} is beyond the generation range of a {}-slot ring",
                self.first_sequence, self.capacity
            )));
        }
        if self.tuple_delimiter == self.field_delimiter {
            return Err(FormatError::InvalidConfig(format!(
                "tuple and field delimiter are both {:?}",
                self.tuple_delimiter as char
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<SpanningTupleBuffer> {
        self.validate()?;
        SpanningTupleBuffer::new(
            self.capacity,
            self.tuple_delimiter,
            self.field_delimiter,
            self.first_sequence,
        )
    }
}
