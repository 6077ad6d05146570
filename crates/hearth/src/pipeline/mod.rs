//! Pipeline orchestrator.
//!
//! One invocation runs Locate → Parse → Normalize → Load for a single extract
//! date and produces one [`LoadResult`]. Stages are strictly sequential; the
//! shutdown token is checked between them.

mod download;
mod result;
mod state;

pub use result::{ErrorBody, InvocationResponse, LoadResult, LoadStatus};
pub use state::{PipelineState, Stage, StateMachine};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hearth_core::metrics::events::{
    DuplicatesDropped, InvocationCompleted, InvocationStatus, LastLoadedPartition, RowsLoaded,
    StageCompleted,
};
use hearth_core::{StorageProvider, StorageProviderRef, emit};

use crate::config::{Config, DatasetKey, EmptySourcePolicy, ErrorPolicy};
use crate::dlq::{DeadLetterQueue, FailureTracker, RecordIssue};
use crate::error::{PipelineError, WarehouseError};
use crate::request::ExtractRequest;
use crate::sink::{TableLoad, WarehouseRef};
use crate::source::{ObjectLocator, ObjectRef, RawRecord, RecordParser, assign_objects};
use crate::transform::{CanonicalRecord, LookupTable, Normalizer, deduplicate};

use download::Downloader;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Runs invocations against injected storage and warehouse handles.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    storage: StorageProviderRef,
    warehouse: WarehouseRef,
    dlq: Option<DeadLetterQueue>,
    shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, storage: StorageProviderRef, warehouse: WarehouseRef) -> Self {
        Self {
            config,
            storage,
            warehouse,
            dlq: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Build the source storage and DLQ the configuration describes.
    pub async fn from_config(
        config: Arc<Config>,
        warehouse: WarehouseRef,
        shutdown: CancellationToken,
    ) -> Result<Self, PipelineError> {
        let storage = StorageProvider::for_url_with_options(
            &config.source.path,
            config.source.storage_options.clone(),
            Some(Duration::from_secs(config.source.timeout_secs)),
        )
        .await?;
        let dlq = DeadLetterQueue::from_config(&config.error_handling).await?;

        info!(
            source = %storage.url(),
            warehouse = warehouse.name(),
            datasets = config.dataset_count(),
            dlq = dlq.is_some(),
            "Pipeline initialized"
        );

        Ok(Self::new(config, Arc::new(storage), warehouse)
            .with_dlq(dlq)
            .with_shutdown(shutdown))
    }

    pub fn with_dlq(mut self, dlq: Option<DeadLetterQueue>) -> Self {
        self.dlq = dlq;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Run one invocation from a raw trigger payload.
    ///
    /// A payload that is not `{"extractDate": "YYYY-MM-DD"}` fails with
    /// `InvalidRequest` before any storage or warehouse call.
    pub async fn invoke(&self, payload: &[u8]) -> LoadResult {
        match ExtractRequest::from_payload(payload) {
            Ok(request) => self.run(request).await,
            Err(e) => {
                let error = PipelineError::from(e);
                warn!(error = %error, "Rejected invocation payload");
                emit!(InvocationCompleted {
                    status: InvocationStatus::Failed,
                    duration: Duration::ZERO,
                });
                LoadResult::failure(None, Stage::Request, &error, Vec::new())
            }
        }
    }

    /// Run one invocation for a validated request.
    pub async fn run(&self, request: ExtractRequest) -> LoadResult {
        let start = Instant::now();
        let date = request.extract_date();
        info!(%date, "Invocation received");

        let mut invocation = Invocation::new(self, date);
        let outcome = match invocation.execute().await {
            Ok(tables) => Ok(tables),
            Err(e) => Err((invocation.machine.fail(e.to_string()), e)),
        };
        let issues = invocation.failures.into_issues();
        self.write_dead_letters(date, &issues).await;

        let result = match outcome {
            Ok(tables) => {
                for (table, count) in &tables {
                    emit!(RowsLoaded {
                        count: *count,
                        table: table.clone(),
                    });
                }
                if !tables.is_empty() {
                    emit!(LastLoadedPartition {
                        days_since_epoch: i64::from(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    });
                }
                emit!(InvocationCompleted {
                    status: InvocationStatus::Done,
                    duration: start.elapsed(),
                });
                LoadResult::success(date, tables, issues)
            }
            Err((stage, e)) => {
                error!(%date, %stage, kind = e.kind(), retryable = e.is_retryable(), error = %e, "Invocation failed");
                emit!(InvocationCompleted {
                    status: InvocationStatus::Failed,
                    duration: start.elapsed(),
                });
                LoadResult::failure(Some(date), stage, &e, issues)
            }
        };

        info!(
            %date,
            status = if result.is_success() { "success" } else { "error" },
            rows = result.rows_loaded,
            skipped = result.skipped_records(),
            elapsed_ms = start.elapsed().as_millis(),
            "Invocation finished"
        );
        result
    }

    /// DLQ write failures are logged; they never change the outcome.
    async fn write_dead_letters(&self, date: NaiveDate, issues: &[RecordIssue]) {
        if let Some(dlq) = &self.dlq
            && let Err(e) = dlq.write(date, issues).await
        {
            error!(%date, error = %e, "Failed to write DLQ");
        }
    }
}

/// State for one invocation.
///
/// Errors are attributed to the stage the state machine is about to leave,
/// so stage bookkeeping happens in one place.
struct Invocation<'a> {
    pipeline: &'a Pipeline,
    date: NaiveDate,
    machine: StateMachine,
    failures: FailureTracker,
}

impl<'a> Invocation<'a> {
    fn new(pipeline: &'a Pipeline, date: NaiveDate) -> Self {
        Self {
            pipeline,
            date,
            machine: StateMachine::new(),
            failures: FailureTracker::new(pipeline.config.error_handling.max_failures),
        }
    }

    fn config(&self) -> &'a Config {
        &self.pipeline.config
    }

    /// Start the next stage unless shutdown was requested.
    fn ensure_running(&self) -> Result<Instant, PipelineError> {
        if self.pipeline.shutdown.is_cancelled() {
            info!(
                date = %self.date,
                state = self.machine.state().name(),
                stage = ?self.machine.state().next_stage(),
                "Shutdown requested, not starting next stage"
            );
            return Err(PipelineError::Cancelled);
        }
        Ok(Instant::now())
    }

    fn complete(&mut self, stage: Stage, started: Instant) {
        emit!(StageCompleted {
            stage: stage.as_str(),
            duration: started.elapsed(),
        });
        self.machine.advance();
        info!(
            date = %self.date,
            %stage,
            state = self.machine.state().name(),
            elapsed_ms = started.elapsed().as_millis(),
            "Stage completed"
        );
    }

    async fn execute(&mut self) -> Result<IndexMap<String, u64>, PipelineError> {
        let config = self.config();

        // Locate
        let started = self.ensure_running()?;
        let locator = ObjectLocator::new(
            Arc::clone(&self.pipeline.storage),
            config.source.prefix_template.as_str(),
        );
        let objects = locator.locate(self.date).await?;
        let assigned = assign_objects(config, &objects);
        let claimed: usize = assigned.values().map(Vec::len).sum();

        if claimed == 0 {
            match config.policy.on_empty_source {
                EmptySourcePolicy::Succeed => {
                    info!(date = %self.date, located = objects.len(), "No source objects for any dataset, nothing to load");
                    self.complete(Stage::Locate, started);
                    self.machine.finish();
                    return Ok(IndexMap::new());
                }
                EmptySourcePolicy::Fail => {
                    return Err(PipelineError::NoData { date: self.date });
                }
                EmptySourcePolicy::Clear => {
                    info!(date = %self.date, located = objects.len(), "No source objects for any dataset, clearing partition");
                }
            }
        }
        self.complete(Stage::Locate, started);

        // Parse
        let started = self.ensure_running()?;
        let parsed = self.parse_all(&assigned).await?;
        self.failures.check_limit()?;
        self.complete(Stage::Parse, started);

        // Normalize
        let started = self.ensure_running()?;
        let lookups = self.fetch_lookups(&parsed).await?;
        let loads = self.normalize_all(parsed, &lookups)?;
        self.failures.check_limit()?;
        self.complete(Stage::Normalize, started);

        // Load
        let started = self.ensure_running()?;
        let tables = self
            .pipeline
            .warehouse
            .replace_partitions(&loads, self.date)
            .await?;
        self.complete(Stage::Load, started);

        self.machine.advance();
        Ok(tables)
    }

    /// Download and decode every claimed object, recording soft failures.
    ///
    /// Under `fail_fast` the first error in object-key order fails the stage.
    async fn parse_all(
        &mut self,
        assigned: &IndexMap<DatasetKey, Vec<ObjectRef>>,
    ) -> Result<IndexMap<DatasetKey, Vec<RawRecord>>, PipelineError> {
        let config = self.config();
        let policy = config.policy.on_error;

        let parsers: IndexMap<DatasetKey, Arc<RecordParser>> = config
            .datasets()
            .map(|(key, dataset)| {
                (
                    key.clone(),
                    Arc::new(RecordParser::for_dataset(key, dataset, policy)),
                )
            })
            .collect();

        let downloader = Downloader::new(
            Arc::clone(&self.pipeline.storage),
            config.source.max_concurrent_objects,
        );
        let downloaded = downloader.run(assigned, &parsers).await;

        let mut records: IndexMap<DatasetKey, Vec<RawRecord>> = assigned
            .keys()
            .map(|key| (key.clone(), Vec::new()))
            .collect();

        for item in downloaded {
            let parsed = item.result?;
            // A skipped object carries a single issue that accounts for
            // every row it dropped; row-level issues drop one row each.
            let single = parsed.issues.len() == 1;
            for issue in &parsed.issues {
                let dropped = if single { parsed.dropped_records } else { 1 };
                self.failures.record(
                    RecordIssue::from_parse(item.dataset.id(), issue).with_dropped_records(dropped),
                );
            }
            debug!(
                target = %item.dataset,
                key = %parsed.key,
                records = parsed.records.len(),
                issues = parsed.issues.len(),
                "Object parsed"
            );
            if let Some(bucket) = records.get_mut(&item.dataset) {
                bucket.extend(parsed.records);
            }
        }

        Ok(records)
    }

    /// Read every lookup table a dataset with records needs, once each.
    async fn fetch_lookups(
        &self,
        parsed: &IndexMap<DatasetKey, Vec<RawRecord>>,
    ) -> Result<IndexMap<DatasetKey, LookupTable>, WarehouseError> {
        let mut lookups = IndexMap::new();

        for (key, dataset) in self.config().datasets() {
            let Some(lookup) = &dataset.lookup else {
                continue;
            };
            if parsed.get(key).is_none_or(Vec::is_empty) {
                continue;
            }

            let columns = LookupTable::fetch_columns(lookup, dataset);
            let rows = self
                .pipeline
                .warehouse
                .fetch_table(&lookup.table, &columns)
                .await?;
            let table = LookupTable::from_rows(lookup, rows);
            info!(target = %key, table = %lookup.table, rows = table.len(), "Loaded lookup table");
            lookups.insert(key.clone(), table);
        }

        Ok(lookups)
    }

    /// Normalize and deduplicate each dataset into its table load.
    ///
    /// Every configured dataset yields a load, so a dataset with no records
    /// clears its partition.
    fn normalize_all(
        &mut self,
        parsed: IndexMap<DatasetKey, Vec<RawRecord>>,
        lookups: &IndexMap<DatasetKey, LookupTable>,
    ) -> Result<Vec<TableLoad>, PipelineError> {
        let config = self.config();
        let mut loads = Vec::with_capacity(parsed.len());

        for (key, raw) in parsed {
            let Some(dataset) = config.datasets.get(&key) else {
                continue;
            };
            let normalizer = Normalizer::new(&key, dataset).with_lookup(lookups.get(&key));
            let canonical = self.normalize_dataset(&normalizer, raw)?;

            let deduplicated = deduplicate(key.id(), canonical, config.policy.on_duplicate)?;
            if deduplicated.dropped > 0 {
                emit!(DuplicatesDropped {
                    count: deduplicated.dropped as u64,
                    dataset: key.id().to_string(),
                });
                debug!(target = %key, dropped = deduplicated.dropped, "Dropped duplicate records");
            }

            let columns = dataset.load_columns();
            let rows = deduplicated
                .records
                .iter()
                .map(|record| record.to_row(&columns))
                .collect();
            loads.push(TableLoad {
                table: dataset.table.clone(),
                partition_column: dataset.partition_column.clone(),
                columns,
                rows,
            });
        }

        Ok(loads)
    }

    fn normalize_dataset(
        &mut self,
        normalizer: &Normalizer<'_>,
        raw: Vec<RawRecord>,
    ) -> Result<Vec<CanonicalRecord>, PipelineError> {
        let dataset = normalizer.dataset().id().to_string();
        let policy = self.config().policy.on_error;
        let mut canonical = Vec::with_capacity(raw.len());
        let mut failed_objects = HashSet::new();

        let mut rows_per_object: HashMap<&str, usize> = HashMap::new();
        for record in &raw {
            *rows_per_object.entry(record.object_key.as_str()).or_default() += 1;
        }

        for record in &raw {
            if failed_objects.contains(&record.object_key) {
                continue;
            }
            match normalizer.normalize(record, self.date) {
                Ok(normalized) => canonical.push(normalized),
                Err(e) if policy == ErrorPolicy::FailFast => return Err(e.into()),
                Err(e) if policy == ErrorPolicy::SkipObject => {
                    warn!(target = %dataset, key = %record.object_key, error = %e, "Skipping object with invalid record");
                    let dropped = rows_per_object
                        .get(record.object_key.as_str())
                        .copied()
                        .unwrap_or(1);
                    self.failures.record(
                        RecordIssue::from_normalization(&dataset, &e).with_dropped_records(dropped),
                    );
                    failed_objects.insert(record.object_key.clone());
                }
                Err(e) => {
                    self.failures
                        .record(RecordIssue::from_normalization(&dataset, &e));
                }
            }
        }

        if !failed_objects.is_empty() {
            canonical.retain(|r: &CanonicalRecord| !failed_objects.contains(&r.object_key));
        }
        Ok(canonical)
    }
}
