//! CSV reader.
//!
//! The first row is the header. Fields are trimmed; an empty field decodes as
//! `Null`. Values stay text so coercion happens in one place.

use indexmap::IndexMap;

use crate::error::ParseError;
use crate::transform::RawValue;

use super::RawRecord;
use super::traits::{ReadResult, RecordReader};

/// Reader for delimited text with a header row.
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
    required: Vec<String>,
}

impl CsvReader {
    /// `required` lists the source columns the header must contain.
    pub fn new(delimiter: u8, required: Vec<String>) -> Self {
        Self {
            delimiter,
            required,
        }
    }
}

impl RecordReader for CsvReader {
    fn read(&self, data: &[u8], key: &str) -> Result<ReadResult, ParseError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(ReadResult::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .has_headers(true)
            .from_reader(data);

        let headers = reader
            .headers()
            .map_err(|e| ParseError::Header {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .clone();

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|column| !headers.iter().any(|h| h == column.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ParseError::MissingColumns {
                key: key.to_string(),
                columns: missing,
            });
        }

        let mut result = ReadResult::default();
        for (index, row) in reader.records().enumerate() {
            let row_number = index + 1;
            match row {
                Ok(record) => {
                    let fields: IndexMap<String, RawValue> = headers
                        .iter()
                        .zip(record.iter())
                        .map(|(name, value)| {
                            let value = if value.is_empty() {
                                RawValue::Null
                            } else {
                                RawValue::Text(value.to_string())
                            };
                            (name.to_string(), value)
                        })
                        .collect();
                    result.records.push(RawRecord::new(key, row_number, fields));
                }
                Err(e) => result.row_errors.push(ParseError::MalformedRow {
                    key: key.to_string(),
                    row: row_number,
                    message: e.to_string(),
                }),
            }
        }

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
