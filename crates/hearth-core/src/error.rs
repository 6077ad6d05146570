//! Common error types shared across hearth crates.
//!
//! This module defines error types for storage, configuration, metrics, and
//! dead-letter operations.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },

    /// Prefix template contains an unsupported strftime specifier.
    #[snafu(display("Invalid prefix template: {template}"))]
    InvalidPrefixTemplate { template: String },

    /// Operation did not complete within the configured timeout.
    #[snafu(display("Storage {operation} timed out after {secs}s"))]
    Timeout { operation: String, secs: u64 },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Prefix template is empty.
    #[snafu(display("Source prefix_template cannot be empty"))]
    EmptyPrefixTemplate,

    /// Warehouse URL is empty.
    #[snafu(display("Warehouse url cannot be empty"))]
    EmptyWarehouseUrl,

    /// No datasets were configured.
    #[snafu(display("At least one dataset must be configured"))]
    NoDatasets,

    /// Dataset has no column mappings.
    #[snafu(display("Dataset '{dataset}' has no columns"))]
    EmptyColumns { dataset: String },

    /// Dataset has no key columns.
    #[snafu(display("Dataset '{dataset}' must declare at least one key column"))]
    EmptyKeyColumns { dataset: String },

    /// A SQL identifier contains characters outside `[A-Za-z0-9_]`.
    #[snafu(display("Invalid identifier '{name}' in {context}"))]
    InvalidIdentifier { context: String, name: String },

    /// A key or lookup column is not part of the dataset mapping.
    #[snafu(display("Dataset '{dataset}' references unmapped column '{column}' in {context}"))]
    UnknownColumn {
        dataset: String,
        column: String,
        context: String,
    },

    /// Two mappings in one dataset produce the same canonical column.
    #[snafu(display("Dataset '{dataset}' maps column '{column}' more than once"))]
    DuplicateColumn { dataset: String, column: String },

    /// A setting has a value outside its allowed range.
    #[snafu(display("Invalid value for {field}: {message}"))]
    InvalidValue { field: String, message: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Duplicate component keys found across config files.
    #[snafu(display("Duplicate component keys: {}", keys.join(", ")))]
    DuplicateComponents { keys: Vec<String> },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },

    /// Failed to read configuration directory.
    #[snafu(display("Failed to read directory {}", path.display()))]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Multiple configuration errors occurred.
    #[snafu(display("Multiple config errors:\n{}", errors.join("\n")))]
    MultipleErrors { errors: Vec<String> },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics recorder already installed (double-init attempted).
    #[snafu(display("Metrics recorder already initialized"))]
    AlreadyInitialized,

    /// Metrics recorder not installed (controller accessed before init).
    #[snafu(display("Metrics recorder not initialized"))]
    NotInitialized,
}

// ============ DLQ Errors ============

/// Errors that can occur while writing rejected records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix avoids snafu selector conflicts (e.g., WriteSnafu)
#[allow(clippy::enum_variant_names)]
pub enum DlqError {
    /// Failed to write to DLQ.
    #[snafu(display("Failed to write to DLQ"))]
    DlqWrite { source: StorageError },

    /// Failed to serialize a rejected record.
    #[snafu(display("Failed to serialize DLQ record"))]
    DlqSerialize { source: serde_json::Error },

    /// Failed to create DLQ storage provider.
    #[snafu(display("Failed to create DLQ storage"))]
    DlqStorage { source: StorageError },
}
