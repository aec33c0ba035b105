use std::sync::Arc;

use super::{FormatterPool, InputFormatter, RecordSink};
use crate::Core::error::{FormatError, Result};
use crate::STBuffer::STBufferBuilder;

pub struct FormatterBuilder {
    buffer: STBufferBuilder,
    workers: usize,
}

impl Default for FormatterBuilder {
    fn default() -> Self {
        Self {
            buffer: STBufferBuilder::default(),
            workers: 4,
        }
    }
}

impl FormatterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer = self.buffer.with_capacity(capacity);
        self
    }

    pub fn with_tuple_delimiter(mut self, delimiter: u8) -> Self {
        self.buffer = self.buffer.with_tuple_delimiter(delimiter);
        self
    }

    pub fn with_field_delimiter(mut self, delimiter: u8) -> Self {
        self.buffer = self.buffer.with_field_delimiter(delimiter);
        self
    }

    pub fn with_first_sequence(mut self, sequence: u64) -> Self {
        self.buffer = self.buffer.with_first_sequence(sequence);
        self
    }

    /// Worker threads of a [`FormatterPool`]. Ignored by [`build`](Self::build).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn build(self) -> Result<InputFormatter> {
        Ok(InputFormatter::new(self.buffer.build()?))
    }

    pub fn build_pool(self, sink: Arc<dyn RecordSink>) -> Result<FormatterPool> {
        if self.workers == 0 {
            return Err(FormatError::InvalidConfig(
                "a formatter pool needs at least one worker".to_string(),
            ));
        }
        let workers = self.workers;
        let formatter = self.build()?;
        Ok(FormatterPool::start(formatter, sink, workers))
    }
}
