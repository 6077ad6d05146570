//! Dead Letter Queue implementation.
//!
//! Records soft failures to a configurable location for later inspection and
//! reprocessing. Each invocation with issues writes one NDJSON file.

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use object_store::PutPayload;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use hearth_core::StorageProvider;
use hearth_core::StorageProviderRef;
use hearth_core::config::ErrorHandlingConfig;
use hearth_core::error::{DlqError, DlqSerializeSnafu, DlqStorageSnafu, DlqWriteSnafu};

use super::types::{FailureStats, RecordIssue};

/// Timeout applied to every DLQ write.
const DLQ_TIMEOUT: Duration = Duration::from_secs(30);

/// Dead Letter Queue for recording dropped records.
#[derive(Debug, Clone)]
pub struct DeadLetterQueue {
    storage: StorageProviderRef,
}

impl DeadLetterQueue {
    /// Create a new DLQ from configuration.
    ///
    /// Returns `None` if no DLQ path is configured.
    pub async fn from_config(config: &ErrorHandlingConfig) -> Result<Option<Self>, DlqError> {
        let Some(dlq_path) = &config.dlq_path else {
            return Ok(None);
        };

        let storage = StorageProvider::for_url_with_options(
            dlq_path,
            config.dlq_storage_options.clone(),
            Some(DLQ_TIMEOUT),
        )
        .await
        .context(DlqStorageSnafu)?;

        info!("DLQ enabled: {}", storage.url());
        Ok(Some(Self::new(Arc::new(storage))))
    }

    pub fn new(storage: StorageProviderRef) -> Self {
        Self { storage }
    }

    /// Write one invocation's issues as `failures-<date>-<timestamp>.ndjson`.
    ///
    /// Returns the written path, or `None` when there was nothing to write.
    pub async fn write(
        &self,
        extract_date: NaiveDate,
        issues: &[RecordIssue],
    ) -> Result<Option<String>, DlqError> {
        if issues.is_empty() {
            return Ok(None);
        }

        let mut ndjson = String::new();
        let mut stats = FailureStats::default();
        for issue in issues {
            let line = serde_json::to_string(issue).context(DlqSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
            stats.increment(issue.stage);
        }

        let filename = format!(
            "failures-{}-{}.ndjson",
            extract_date.format("%Y%m%d"),
            Utc::now().format("%Y%m%d-%H%M%S%.3f")
        );
        debug!("Flushing {} DLQ records to {}", issues.len(), filename);

        let path = Path::from(filename.as_str());
        self.storage
            .put_payload(&path, PutPayload::from(Bytes::from(ndjson)))
            .await
            .context(DlqWriteSnafu)?;

        info!(
            "DLQ written: {} total failures (parse={}, normalize={}) to {}/{}",
            stats.total(),
            stats.parse,
            stats.normalize,
            self.storage.url(),
            filename
        );
        Ok(Some(filename))
    }
}
