//! Soft-failure records and per-stage counts.

use serde::{Deserialize, Serialize};

use crate::error::{NormalizationError, ParseError};
use crate::pipeline::Stage;

/// One record or object that was dropped under a fail-soft policy.
///
/// `dropped_records` is how many records the issue kept out of the load:
/// one for a skipped record, every record of the object for a skipped object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIssue {
    pub stage: Stage,
    pub dataset: String,
    pub object_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    pub dropped_records: usize,
}

impl RecordIssue {
    pub fn from_parse(dataset: &str, error: &ParseError) -> Self {
        Self {
            stage: Stage::Parse,
            dataset: dataset.to_string(),
            object_key: Some(error.object_key().to_string()),
            row: error.row(),
            field: None,
            message: error.to_string(),
            dropped_records: 1,
        }
    }

    pub fn from_normalization(dataset: &str, error: &NormalizationError) -> Self {
        Self {
            stage: Stage::Normalize,
            dataset: dataset.to_string(),
            object_key: error.object_key().map(str::to_string),
            row: error.row(),
            field: error.field().map(str::to_string),
            message: error.to_string(),
            dropped_records: 1,
        }
    }

    pub fn with_dropped_records(mut self, dropped_records: usize) -> Self {
        self.dropped_records = dropped_records;
        self
    }
}

/// Statistics about soft failures by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureStats {
    pub parse: usize,
    pub normalize: usize,
}

impl FailureStats {
    /// Increment the count for a specific stage.
    pub fn increment(&mut self, stage: Stage) {
        match stage {
            Stage::Normalize => self.normalize += 1,
            _ => self.parse += 1,
        }
    }

    /// Get total failure count.
    pub fn total(&self) -> usize {
        self.parse + self.normalize
    }
}
