//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in an extract run.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.
//!
//! Per-dataset metrics carry a `dataset` label and loader metrics a `table`
//! label so that a single run over several datasets stays observable.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when the locator has listed the partition for a date.
pub struct ObjectsLocated {
    pub count: u64,
}

impl InternalEvent for ObjectsLocated {
    fn emit(self) {
        trace!(count = self.count, "Objects located");
        counter!("hearth_objects_located_total").increment(self.count);
    }
}

/// Event emitted when raw object bytes are read from the source.
pub struct BytesRead {
    pub bytes: u64,
    pub dataset: String,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, dataset = %self.dataset, "Bytes read");
        counter!("hearth_bytes_read_total", "dataset" => self.dataset).increment(self.bytes);
    }
}

/// Outcome of reading a single source object.
#[derive(Debug, Clone, Copy)]
pub enum ObjectStatus {
    Parsed,
    Skipped,
    Failed,
}

impl ObjectStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ObjectStatus::Parsed => "parsed",
            ObjectStatus::Skipped => "skipped",
            ObjectStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a source object has been handled by the parser.
pub struct ObjectProcessed {
    pub status: ObjectStatus,
    pub dataset: String,
}

impl InternalEvent for ObjectProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), dataset = %self.dataset, "Object processed");
        counter!("hearth_objects_processed_total", "status" => self.status.as_str(), "dataset" => self.dataset).increment(1);
    }
}

/// Event emitted when raw records are parsed out of an object.
pub struct RecordsParsed {
    pub count: u64,
    pub dataset: String,
}

impl InternalEvent for RecordsParsed {
    fn emit(self) {
        trace!(count = self.count, dataset = %self.dataset, "Records parsed");
        counter!("hearth_records_parsed_total", "dataset" => self.dataset).increment(self.count);
    }
}

/// Event emitted when a record is dropped under the fail-soft policy.
pub struct RecordsRejected {
    pub count: u64,
    pub stage: &'static str,
    pub dataset: String,
}

impl InternalEvent for RecordsRejected {
    fn emit(self) {
        trace!(count = self.count, stage = self.stage, dataset = %self.dataset, "Records rejected");
        counter!("hearth_records_rejected_total", "stage" => self.stage, "dataset" => self.dataset).increment(self.count);
    }
}

/// Event emitted when deduplication collapses records sharing a key.
pub struct DuplicatesDropped {
    pub count: u64,
    pub dataset: String,
}

impl InternalEvent for DuplicatesDropped {
    fn emit(self) {
        trace!(count = self.count, dataset = %self.dataset, "Duplicates dropped");
        counter!("hearth_duplicates_dropped_total", "dataset" => self.dataset).increment(self.count);
    }
}

/// Event emitted when rows are committed to a warehouse table.
pub struct RowsLoaded {
    pub count: u64,
    pub table: String,
}

impl InternalEvent for RowsLoaded {
    fn emit(self) {
        trace!(count = self.count, table = %self.table, "Rows loaded");
        counter!("hearth_rows_loaded_total", "table" => self.table).increment(self.count);
    }
}

// ============================================================================
// Histogram events for timing
// ============================================================================

/// Event emitted when a pipeline stage finishes, successfully or not.
pub struct StageCompleted {
    pub stage: &'static str,
    pub duration: Duration,
}

impl InternalEvent for StageCompleted {
    fn emit(self) {
        trace!(stage = self.stage, duration_ms = self.duration.as_millis(), "Stage completed");
        histogram!("hearth_stage_duration_seconds", "stage" => self.stage).record(self.duration.as_secs_f64());
    }
}

/// Terminal status of one invocation.
#[derive(Debug, Clone, Copy)]
pub enum InvocationStatus {
    Done,
    Failed,
}

impl InvocationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Done => "done",
            InvocationStatus::Failed => "failed",
        }
    }
}

/// Event emitted once per invocation with its overall duration.
pub struct InvocationCompleted {
    pub status: InvocationStatus,
    pub duration: Duration,
}

impl InternalEvent for InvocationCompleted {
    fn emit(self) {
        trace!(status = self.status.as_str(), duration_ms = self.duration.as_millis(), "Invocation completed");
        counter!("hearth_invocations_total", "status" => self.status.as_str()).increment(1);
        histogram!("hearth_invocation_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Gauge events
// ============================================================================

/// Gauge for the number of object downloads currently in flight.
pub struct ActiveDownloads {
    pub count: usize,
}

impl InternalEvent for ActiveDownloads {
    fn emit(self) {
        trace!(count = self.count, "Active downloads");
        gauge!("hearth_active_downloads").set(self.count as f64);
    }
}

/// Gauge recording the partition date of the last successful load, as days
/// since the Unix epoch.
pub struct LastLoadedPartition {
    pub days_since_epoch: i64,
}

impl InternalEvent for LastLoadedPartition {
    fn emit(self) {
        trace!(days = self.days_since_epoch, "Last loaded partition");
        gauge!("hearth_last_loaded_partition_days").set(self.days_since_epoch as f64);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    List,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::List => "list",
        }
    }
}

/// Request status for storage operations.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted for each object store request.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "hearth_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted with the latency of an object store request.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "hearth_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
