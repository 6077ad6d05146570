//! Terminal outcome of one invocation and its JSON response.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dlq::RecordIssue;
use crate::error::PipelineError;

use super::Stage;

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    Failure {
        stage: Stage,
        kind: &'static str,
        message: String,
        retryable: bool,
    },
}

/// The terminal artifact of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// `None` only when the request itself could not be read.
    pub partition_date: Option<NaiveDate>,
    pub rows_loaded: u64,
    /// Rows written per table, in load order.
    pub tables: IndexMap<String, u64>,
    /// Records and objects dropped under a fail-soft policy.
    pub issues: Vec<RecordIssue>,
    pub status: LoadStatus,
}

impl LoadResult {
    pub fn success(
        partition_date: NaiveDate,
        tables: IndexMap<String, u64>,
        issues: Vec<RecordIssue>,
    ) -> Self {
        Self {
            partition_date: Some(partition_date),
            rows_loaded: tables.values().sum(),
            tables,
            issues,
            status: LoadStatus::Success,
        }
    }

    pub fn failure(
        partition_date: Option<NaiveDate>,
        stage: Stage,
        error: &PipelineError,
        issues: Vec<RecordIssue>,
    ) -> Self {
        Self {
            partition_date,
            rows_loaded: 0,
            tables: IndexMap::new(),
            issues,
            status: LoadStatus::Failure {
                stage,
                kind: error.kind(),
                message: error.to_string(),
                retryable: error.is_retryable(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == LoadStatus::Success
    }

    /// Error kind, if the invocation failed.
    pub fn error_kind(&self) -> Option<&'static str> {
        match &self.status {
            LoadStatus::Success => None,
            LoadStatus::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.status, LoadStatus::Failure { retryable: true, .. })
    }

    /// Records kept out of the load by fail-soft policies.
    pub fn skipped_records(&self) -> usize {
        self.issues.iter().map(|issue| issue.dropped_records).sum()
    }

    /// The JSON body returned to the trigger.
    pub fn response(&self) -> InvocationResponse {
        let (status, rows_loaded, tables, error) = match &self.status {
            LoadStatus::Success => (
                "success",
                Some(self.rows_loaded),
                Some(self.tables.clone()),
                None,
            ),
            LoadStatus::Failure {
                stage,
                kind,
                message,
                retryable,
            } => (
                "error",
                None,
                None,
                Some(ErrorBody {
                    stage: *stage,
                    kind: kind.to_string(),
                    message: message.clone(),
                    retryable: *retryable,
                }),
            ),
        };

        InvocationResponse {
            status: status.to_string(),
            partition_date: self.partition_date,
            rows_loaded,
            tables,
            skipped_records: self.skipped_records(),
            issues: self.issues.clone(),
            error,
        }
    }
}

/// Invocation response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// `success` or `error`.
    pub status: String,
    pub partition_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_loaded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<IndexMap<String, u64>>,
    pub skipped_records: usize,
    pub issues: Vec<RecordIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Failure details in an [`InvocationResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub stage: Stage,
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 17).unwrap()
    }

    #[test]
    fn test_success_response() {
        let mut tables = IndexMap::new();
        tables.insert("living_wage".to_string(), 3);
        tables.insert("annual_expense".to_string(), 2);

        let result = LoadResult::success(date(), tables, vec![]);
        let json = serde_json::to_value(result.response()).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["partitionDate"], "2023-03-17");
        assert_eq!(json["rowsLoaded"], 5);
        assert_eq!(json["tables"]["living_wage"], 3);
        assert_eq!(json["skippedRecords"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_skipped_records_counts_every_dropped_row() {
        let skipped_object = RecordIssue {
            stage: Stage::Parse,
            dataset: "living_wage".into(),
            object_key: Some("d/living_wage-a.csv".into()),
            row: Some(3),
            field: None,
            message: "Malformed row 3".into(),
            dropped_records: 5,
        };
        let skipped_row = RecordIssue {
            object_key: Some("d/living_wage-b.csv".into()),
            dropped_records: 1,
            ..skipped_object.clone()
        };

        let result = LoadResult::success(date(), IndexMap::new(), vec![skipped_object, skipped_row]);

        assert_eq!(result.skipped_records(), 6);
        assert_eq!(result.response().skipped_records, 6);
    }

    #[test]
    fn test_invalid_request_response() {
        let error = PipelineError::from(RequestError::InvalidDate {
            value: "2023-02-30".into(),
        });
        let result = LoadResult::failure(None, Stage::Request, &error, vec![]);
        let json = serde_json::to_value(result.response()).unwrap();

        assert!(!result.is_success());
        assert_eq!(json["status"], "error");
        assert!(json["partitionDate"].is_null());
        assert!(json.get("rowsLoaded").is_none());
        assert_eq!(json["error"]["stage"], "request");
        assert_eq!(json["error"]["kind"], "InvalidRequest");
        assert_eq!(json["error"]["retryable"], false);
    }

    #[test]
    fn test_response_round_trips() {
        let result = LoadResult::failure(Some(date()), Stage::Locate, &PipelineError::Cancelled, vec![]);
        let response = result.response();
        let text = serde_json::to_string(&response).unwrap();
        let parsed: InvocationResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, response);
        assert!(result.is_retryable());
    }
}
