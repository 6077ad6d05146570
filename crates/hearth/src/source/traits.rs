//! Traits for source format readers.

use crate::error::ParseError;

use super::RawRecord;

/// Records decoded from one object.
#[derive(Debug, Default)]
pub struct ReadResult {
    pub records: Vec<RawRecord>,
    /// Rows that could not be decoded. The object itself was readable.
    pub row_errors: Vec<ParseError>,
}

/// Trait for readers that decode uncompressed object bytes into raw records.
///
/// An `Err` means the whole object is unusable (unreadable header, missing
/// required columns); row-level problems are returned in `row_errors`.
pub trait RecordReader: Send + Sync {
    fn read(&self, data: &[u8], key: &str) -> Result<ReadResult, ParseError>;

    /// Format name (for logging).
    fn name(&self) -> &'static str;
}
