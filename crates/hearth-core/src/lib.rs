//! hearth-core: Shared components for the hearth ingestion job.
//!
//! This crate holds the pieces that are independent of the cost-of-living
//! datasets themselves:
//!
//! - `storage/` - Object store abstraction (S3, local filesystem, in-memory)
//! - `config/` - Config file discovery, multi-file merging and env interpolation
//! - `metrics/` - Internal metric events and the Prometheus recorder
//! - `error` - Common error types
//! - `tracing` - Subscriber initialization
//! - `signal` - Signal handling for graceful shutdown

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{ComponentKey, ConfigPath, Mergeable, interpolate, load_from_paths};
pub use error::{ConfigError, DlqError, MetricsError, StorageError};
pub use metrics::{MetricsController, init_global as init_metrics, init_test as init_metrics_test};
pub use signal::{cancel_on_shutdown, shutdown_signal};
pub use storage::{DatePrefixGenerator, ObjectEntry, StorageProvider, StorageProviderRef};
pub use tracing::init_tracing;
