// Module naming follows project convention (STBuffer = Spanning-Tuple Buffer)
#[allow(non_snake_case)]
pub mod STBuffer;

#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Format;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub use Core::error::{FormatError, Result};
pub use Format::{CollectingSink, FormatterBuilder, FormatterPool, InputFormatter, Record, RecordSink};
pub use STBuffer::{Claim, SequencedUnit, SpanningRecord, SpanningTupleBuffer, STBufferBuilder};
