pub mod error;
pub mod scan;

pub use error::{FormatError, Result};
pub use scan::{check_unit_len, delimiter_offsets, split_records, RecordSplit, MAX_UNIT_LEN};
