//! Per-dataset record parser: decompression, decoding and error policy.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, warn};

use hearth_core::emit;
use hearth_core::metrics::events::{BytesRead, ObjectProcessed, ObjectStatus, RecordsParsed};

use crate::config::{DatasetConfig, DatasetKey, ErrorPolicy, SourceFormat};
use crate::error::ParseError;

use super::compression::CompressionCodec;
use super::delimited::CsvReader;
use super::locator::ObjectRef;
use super::ndjson::NdjsonReader;
use super::traits::RecordReader;
use super::RawRecord;

/// Outcome of parsing one object under the configured error policy.
#[derive(Debug)]
pub struct ParsedObject {
    pub key: String,
    pub records: Vec<RawRecord>,
    /// Soft failures recorded for this object.
    pub issues: Vec<ParseError>,
    /// Records kept out of the load: malformed rows, plus every readable row
    /// of a skipped object.
    pub dropped_records: usize,
}

impl ParsedObject {
    /// An object dropped whole. An unreadable object counts as one record.
    fn skipped(key: &str, issue: ParseError, dropped_records: usize) -> Self {
        Self {
            key: key.to_string(),
            records: Vec::new(),
            issues: vec![issue],
            dropped_records: dropped_records.max(1),
        }
    }
}

/// Turns object bytes into raw records for one dataset.
pub struct RecordParser {
    dataset: String,
    codec: Box<dyn CompressionCodec>,
    reader: Box<dyn RecordReader>,
    policy: ErrorPolicy,
}

impl RecordParser {
    pub fn new(
        dataset: String,
        codec: Box<dyn CompressionCodec>,
        reader: Box<dyn RecordReader>,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            dataset,
            codec,
            reader,
            policy,
        }
    }

    /// Build the parser a dataset's format and compression call for.
    pub fn for_dataset(key: &DatasetKey, config: &DatasetConfig, policy: ErrorPolicy) -> Self {
        let required: Vec<String> = config.required_sources().map(str::to_string).collect();
        let reader: Box<dyn RecordReader> = match config.format {
            // Validated as ASCII when the config is loaded.
            SourceFormat::Csv => Box::new(CsvReader::new(config.delimiter as u8, required)),
            SourceFormat::Ndjson => Box::new(NdjsonReader::new(required)),
        };
        Self::new(key.id().to_string(), config.compression.codec(), reader, policy)
    }

    /// Parse one object.
    ///
    /// `Err` is returned only under [`ErrorPolicy::FailFast`]; the other
    /// policies turn errors into issues on the returned [`ParsedObject`].
    pub fn parse(&self, object: &ObjectRef, data: &Bytes) -> Result<ParsedObject, ParseError> {
        emit!(BytesRead {
            bytes: data.len() as u64,
            dataset: self.dataset.clone(),
        });
        let start = Instant::now();

        let result = self
            .codec
            .decompress(data)
            .map_err(|e| ParseError::Decompress {
                key: object.key.clone(),
                message: e.message,
            })
            .and_then(|bytes| self.reader.read(&bytes, &object.key));

        let read = match result {
            Ok(read) => read,
            Err(e) if self.policy == ErrorPolicy::FailFast => {
                self.record_status(ObjectStatus::Failed);
                return Err(e);
            }
            Err(e) => {
                warn!(dataset = %self.dataset, key = %object.key, error = %e, "Skipping unreadable object");
                self.record_status(ObjectStatus::Skipped);
                return Ok(ParsedObject::skipped(&object.key, e, 1));
            }
        };

        let mut row_errors = read.row_errors;
        let parsed = match self.policy {
            _ if row_errors.is_empty() => ParsedObject {
                key: object.key.clone(),
                records: read.records,
                issues: Vec::new(),
                dropped_records: 0,
            },
            ErrorPolicy::FailFast => {
                self.record_status(ObjectStatus::Failed);
                return Err(row_errors.swap_remove(0));
            }
            ErrorPolicy::SkipObject => {
                warn!(
                    dataset = %self.dataset,
                    key = %object.key,
                    malformed_rows = row_errors.len(),
                    "Skipping object with malformed rows"
                );
                self.record_status(ObjectStatus::Skipped);
                let dropped = read.records.len() + row_errors.len();
                return Ok(ParsedObject::skipped(
                    &object.key,
                    row_errors.swap_remove(0),
                    dropped,
                ));
            }
            ErrorPolicy::SkipRecord => {
                debug!(
                    dataset = %self.dataset,
                    key = %object.key,
                    malformed_rows = row_errors.len(),
                    "Dropping malformed rows"
                );
                ParsedObject {
                    key: object.key.clone(),
                    records: read.records,
                    dropped_records: row_errors.len(),
                    issues: row_errors,
                }
            }
        };

        self.record_status(ObjectStatus::Parsed);
        emit!(RecordsParsed {
            count: parsed.records.len() as u64,
            dataset: self.dataset.clone(),
        });
        debug!(
            dataset = %self.dataset,
            key = %object.key,
            format = self.reader.name(),
            codec = self.codec.name(),
            records = parsed.records.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Parsed object"
        );

        Ok(parsed)
    }

    fn record_status(&self, status: ObjectStatus) {
        emit!(ObjectProcessed {
            status,
            dataset: self.dataset.clone(),
        });
    }
}
