//! Source side of the job: locating and decoding objects for one date.
//!
//! - `locator`: lists the date's partition and assigns objects to datasets
//! - `compression`: decompression codecs
//! - `delimited` / `ndjson`: format readers behind the `RecordReader` trait
//! - `parser`: codec + reader + error policy for one dataset

mod compression;
mod delimited;
mod locator;
mod ndjson;
mod parser;
mod traits;

pub use compression::{CompressionCodec, DecompressionError, GzipCodec, NoopCodec, ZstdCodec};
pub use delimited::CsvReader;
pub use locator::{ObjectLocator, ObjectRef, assign_objects};
pub use ndjson::NdjsonReader;
pub use parser::{ParsedObject, RecordParser};
pub use traits::{ReadResult, RecordReader};

use indexmap::IndexMap;

use crate::transform::RawValue;

static NULL: RawValue = RawValue::Null;

/// One decoded row of a source object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub object_key: String,
    /// 1-based row number within the object (header excluded for CSV, line
    /// number for NDJSON).
    pub row: usize,
    /// Source field name → value, in source order.
    pub fields: IndexMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(object_key: impl Into<String>, row: usize, fields: IndexMap<String, RawValue>) -> Self {
        Self {
            object_key: object_key.into(),
            row,
            fields,
        }
    }

    /// Value of a field; absent fields read as `Null`.
    pub fn field(&self, name: &str) -> &RawValue {
        self.fields.get(name).unwrap_or(&NULL)
    }
}
