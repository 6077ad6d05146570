//! Invocation payload handling.
//!
//! The trigger payload is `{"extractDate": "YYYY-MM-DD"}`. Anything else is an
//! `InvalidRequest` and is rejected before any I/O happens.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value as JsonValue;
use snafu::prelude::*;

use crate::error::{
    ExtractDateNotStringSnafu, InvalidDateSnafu, InvalidJsonSnafu, MissingExtractDateSnafu,
    NotAnObjectSnafu, RequestError,
};

/// Payload field carrying the date.
pub const EXTRACT_DATE_FIELD: &str = "extractDate";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// A validated request to ingest one day of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractRequest {
    extract_date: NaiveDate,
}

impl ExtractRequest {
    pub fn new(extract_date: NaiveDate) -> Self {
        Self { extract_date }
    }

    pub fn extract_date(&self) -> NaiveDate {
        self.extract_date
    }

    /// Parse a raw trigger payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, RequestError> {
        let json: JsonValue = serde_json::from_slice(payload).context(InvalidJsonSnafu)?;
        Self::from_json(&json)
    }

    /// Parse an already-decoded trigger payload.
    pub fn from_json(json: &JsonValue) -> Result<Self, RequestError> {
        let object = json.as_object().context(NotAnObjectSnafu)?;
        let value = match object.get(EXTRACT_DATE_FIELD) {
            None | Some(JsonValue::Null) => return MissingExtractDateSnafu.fail(),
            Some(value) => value,
        };
        let text = value.as_str().context(ExtractDateNotStringSnafu)?;
        Ok(Self::new(parse_extract_date(text)?))
    }
}

/// Parse a strict `YYYY-MM-DD` calendar date.
///
/// Unpadded fields and impossible dates such as `2023-02-30` are rejected.
pub fn parse_extract_date(text: &str) -> Result<NaiveDate, RequestError> {
    let invalid = || InvalidDateSnafu {
        value: text.to_string(),
    };

    ensure!(ISO_DATE.is_match(text), invalid());
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .with_context(invalid)
}
