//! Newline-delimited JSON reader.
//!
//! Each non-blank line must be a JSON object. Numbers and booleans keep their
//! JSON type; nested arrays and objects are kept as their JSON text.

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::error::ParseError;
use crate::transform::RawValue;

use super::RawRecord;
use super::traits::{ReadResult, RecordReader};

/// Reader for NDJSON objects.
#[derive(Debug, Clone)]
pub struct NdjsonReader {
    required: Vec<String>,
}

impl NdjsonReader {
    /// `required` lists the fields every line must carry (non-null).
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    fn decode_line(&self, line: &[u8], key: &str, row: usize) -> Result<RawRecord, ParseError> {
        let malformed = |message: String| ParseError::MalformedRow {
            key: key.to_string(),
            row,
            message,
        };

        let object: Map<String, JsonValue> =
            serde_json::from_slice(line).map_err(|e| malformed(e.to_string()))?;

        let fields: IndexMap<String, RawValue> = object
            .into_iter()
            .map(|(name, value)| (name, to_raw(value)))
            .collect();

        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|name| fields.get(name.as_str()).is_none_or(RawValue::is_null))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        Ok(RawRecord::new(key, row, fields))
    }
}

fn to_raw(value: JsonValue) -> RawValue {
    match value {
        JsonValue::Null => RawValue::Null,
        JsonValue::Bool(b) => RawValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Integer(i),
            None => n.as_f64().map(RawValue::Float).unwrap_or(RawValue::Null),
        },
        JsonValue::String(s) => RawValue::Text(s),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => RawValue::Text(nested.to_string()),
    }
}

impl RecordReader for NdjsonReader {
    fn read(&self, data: &[u8], key: &str) -> Result<ReadResult, ParseError> {
        let mut result = ReadResult::default();

        for (index, line) in data.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match self.decode_line(line, key, index + 1) {
                Ok(record) => result.records.push(record),
                Err(e) => result.row_errors.push(e),
            }
        }

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "ndjson"
    }
}
