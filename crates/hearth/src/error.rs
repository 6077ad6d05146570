//! Error types for the hearth ingestion job.

use chrono::NaiveDate;
use snafu::prelude::*;

// Re-export common errors
pub use hearth_core::error::{ConfigError, DlqError, MetricsError, StorageError};

/// Errors raised while turning a trigger payload into an `ExtractRequest`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RequestError {
    /// Payload is not valid JSON.
    #[snafu(display("Payload is not valid JSON: {source}"))]
    InvalidJson { source: serde_json::Error },

    /// Payload is valid JSON but not an object.
    #[snafu(display("Payload must be a JSON object"))]
    NotAnObject,

    /// `extractDate` is absent or null.
    #[snafu(display("Missing required field 'extractDate'"))]
    MissingExtractDate,

    /// `extractDate` is not a string.
    #[snafu(display("Field 'extractDate' must be a string"))]
    ExtractDateNotString,

    /// `extractDate` is not a real `YYYY-MM-DD` calendar date.
    #[snafu(display("Invalid extractDate '{value}': expected a calendar date as YYYY-MM-DD"))]
    InvalidDate { value: String },
}

/// Errors raised while decoding a source object into raw records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParseError {
    /// Object bytes could not be decompressed.
    #[snafu(display("Failed to decompress {key}: {message}"))]
    Decompress { key: String, message: String },

    /// Header could not be read.
    #[snafu(display("Failed to read header of {key}: {message}"))]
    Header { key: String, message: String },

    /// Header is missing required source columns.
    #[snafu(display("{key} is missing required columns: {}", columns.join(", ")))]
    MissingColumns { key: String, columns: Vec<String> },

    /// A single row could not be decoded.
    #[snafu(display("Malformed row {row} in {key}: {message}"))]
    MalformedRow {
        key: String,
        row: usize,
        message: String,
    },
}

impl ParseError {
    /// Key of the object the error belongs to.
    pub fn object_key(&self) -> &str {
        match self {
            ParseError::Decompress { key, .. }
            | ParseError::Header { key, .. }
            | ParseError::MissingColumns { key, .. }
            | ParseError::MalformedRow { key, .. } => key,
        }
    }

    /// Row number (1-based, header excluded) when the error is row-scoped.
    pub fn row(&self) -> Option<usize> {
        match self {
            ParseError::MalformedRow { row, .. } => Some(*row),
            _ => None,
        }
    }
}

/// Errors raised while mapping a raw record onto its canonical columns.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NormalizationError {
    /// A non-nullable field is null or absent.
    #[snafu(display("Row {row} in {key}: required field '{field}' is missing"))]
    MissingField {
        key: String,
        row: usize,
        field: String,
    },

    /// A field could not be coerced to its column type.
    #[snafu(display("Row {row} in {key}: field '{field}': {message}"))]
    InvalidField {
        key: String,
        row: usize,
        field: String,
        message: String,
    },

    /// The key columns produced an empty identifier.
    #[snafu(display("Row {row} in {key}: key columns produce an empty id"))]
    EmptyKey { key: String, row: usize },

    /// No lookup row matched the record.
    #[snafu(display("Row {row} in {key}: no {table} row matches ({values})"))]
    LookupMiss {
        key: String,
        row: usize,
        table: String,
        values: String,
    },

    /// Two records share a key and duplicates are rejected.
    #[snafu(display("Duplicate id '{property_id}' in dataset {dataset}: {first} and {second}"))]
    DuplicateKey {
        dataset: String,
        property_id: String,
        first: String,
        second: String,
    },
}

impl NormalizationError {
    /// Key of the object the error belongs to, if any.
    pub fn object_key(&self) -> Option<&str> {
        match self {
            NormalizationError::MissingField { key, .. }
            | NormalizationError::InvalidField { key, .. }
            | NormalizationError::EmptyKey { key, .. }
            | NormalizationError::LookupMiss { key, .. } => Some(key),
            NormalizationError::DuplicateKey { .. } => None,
        }
    }

    /// Row number of the offending record, if any.
    pub fn row(&self) -> Option<usize> {
        match self {
            NormalizationError::MissingField { row, .. }
            | NormalizationError::InvalidField { row, .. }
            | NormalizationError::EmptyKey { row, .. }
            | NormalizationError::LookupMiss { row, .. } => Some(*row),
            NormalizationError::DuplicateKey { .. } => None,
        }
    }

    /// Offending field, if the error is field-scoped.
    pub fn field(&self) -> Option<&str> {
        match self {
            NormalizationError::MissingField { field, .. }
            | NormalizationError::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Errors raised by a warehouse implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WarehouseError {
    /// Could not obtain or keep a connection.
    #[snafu(display("Warehouse connection failed: {source}"))]
    Connection { source: sqlx::Error },

    /// A statement failed against a table.
    #[snafu(display("Warehouse statement on {table} failed: {source}"))]
    Statement { table: String, source: sqlx::Error },

    /// Opening or committing the load transaction failed.
    #[snafu(display("Warehouse transaction {operation} failed: {source}"))]
    Transaction {
        operation: &'static str,
        source: sqlx::Error,
    },

    /// The operation did not finish within the configured timeout.
    #[snafu(display("Warehouse {operation} timed out after {secs}s"))]
    Timeout { operation: String, secs: u64 },

    /// The warehouse refused the data (schema or constraint mismatch).
    #[snafu(display("Warehouse rejected {table}: {message}"))]
    Rejected { table: String, message: String },

    /// The warehouse cannot be reached.
    #[snafu(display("Warehouse unavailable: {message}"))]
    Unavailable { message: String },
}

impl WarehouseError {
    /// Whether retrying the invocation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WarehouseError::Connection { .. }
            | WarehouseError::Timeout { .. }
            | WarehouseError::Unavailable { .. } => true,
            WarehouseError::Statement { source, .. }
            | WarehouseError::Transaction { source, .. } => is_transient(source),
            WarehouseError::Rejected { .. } => false,
        }
    }
}

/// Transport-level failures are transient; anything the database itself
/// reported is not.
fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Top-level pipeline errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Trigger payload was rejected.
    #[snafu(display("Invalid request: {source}"))]
    InvalidRequest { source: RequestError },

    /// Object store could not be listed or read.
    #[snafu(display("Source unavailable: {source}"))]
    SourceUnavailable { source: StorageError },

    /// Parsing failed under the fail-fast policy.
    #[snafu(display("{source}"))]
    Parse { source: ParseError },

    /// Normalization failed under the fail-fast or reject-duplicates policy.
    #[snafu(display("{source}"))]
    Normalization { source: NormalizationError },

    /// Warehouse read or write failed.
    #[snafu(display("{source}"))]
    Warehouse { source: WarehouseError },

    /// The invocation was cancelled between stages.
    #[snafu(display("Invocation cancelled"))]
    Cancelled,

    /// No source objects exist for the date and empty sources are failures.
    #[snafu(display("No source objects found for {date}"))]
    NoData { date: NaiveDate },

    /// Soft failures reached the configured limit.
    #[snafu(display("Maximum failures exceeded: {count} failures (limit {limit})"))]
    TooManyFailures { count: usize, limit: usize },

    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// DLQ error.
    #[snafu(display("DLQ error: {source}"))]
    Dlq { source: DlqError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// Failed to bind the HTTP listener.
    #[snafu(display("Failed to bind {address}: {source}"))]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// HTTP server error.
    #[snafu(display("Server error: {source}"))]
    Serve { source: std::io::Error },
}

impl PipelineError {
    /// Error kind reported in the invocation response.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest { .. } => "InvalidRequest",
            PipelineError::SourceUnavailable { .. } => "SourceUnavailable",
            PipelineError::Parse { .. } => "ParseError",
            PipelineError::Normalization { .. } => "NormalizationError",
            PipelineError::Warehouse { source } if source.is_retryable() => "SinkUnavailable",
            PipelineError::Warehouse { .. } => "SinkRejected",
            PipelineError::Cancelled => "Cancelled",
            PipelineError::NoData { .. } => "NoData",
            PipelineError::TooManyFailures { .. } => "TooManyFailures",
            PipelineError::Config { .. } => "Config",
            PipelineError::Dlq { .. } => "Dlq",
            PipelineError::Metrics { .. } => "Metrics",
            PipelineError::Bind { .. } | PipelineError::Serve { .. } => "Server",
        }
    }

    /// Whether the same invocation may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::SourceUnavailable { .. } | PipelineError::Cancelled => true,
            PipelineError::Warehouse { source } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<RequestError> for PipelineError {
    fn from(source: RequestError) -> Self {
        PipelineError::InvalidRequest { source }
    }
}

impl From<StorageError> for PipelineError {
    fn from(source: StorageError) -> Self {
        PipelineError::SourceUnavailable { source }
    }
}

impl From<ParseError> for PipelineError {
    fn from(source: ParseError) -> Self {
        PipelineError::Parse { source }
    }
}

impl From<NormalizationError> for PipelineError {
    fn from(source: NormalizationError) -> Self {
        PipelineError::Normalization { source }
    }
}

impl From<WarehouseError> for PipelineError {
    fn from(source: WarehouseError) -> Self {
        PipelineError::Warehouse { source }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<DlqError> for PipelineError {
    fn from(source: DlqError) -> Self {
        PipelineError::Dlq { source }
    }
}
