// Input formatting on top of the spanning tuple buffer: one formatter shared by
// a pool of workers, each turning a raw unit into the records it completes.

mod builder;
mod formatter;
mod pool;

pub use builder::FormatterBuilder;
pub use formatter::{InputFormatter, Record};
pub use pool::{CollectingSink, FormatterPool, RecordSink};
