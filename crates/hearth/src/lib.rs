//! Hearth: date-partitioned ingestion of cost-of-living datasets.
//!
//! One invocation takes an extract date, finds that day's objects in the
//! source store, parses and normalizes them per dataset, and replaces the
//! date's partition in each warehouse table atomically.
//!
//! - `request` - Trigger payload validation
//! - `source` - Object location, decompression and record parsing
//! - `transform` - Normalization, lookups and deduplication
//! - `sink` - Warehouse trait with Postgres and in-memory implementations
//! - `pipeline` - Stage orchestration and the invocation result
//! - `dlq` - Per-record failure tracking and the dead letter queue
//! - `server` / `cli` - HTTP and command line triggers

pub mod cli;
pub mod config;
pub mod dlq;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod sink;
pub mod source;
pub mod transform;

// Re-export commonly used items
pub use cli::{CliArgs, Command, execute};
pub use config::Config;
pub use error::PipelineError;
pub use hearth_core::{cancel_on_shutdown, init_tracing};
pub use pipeline::{InvocationResponse, LoadResult, Pipeline, Stage};
pub use request::ExtractRequest;
pub use sink::{MemoryWarehouse, PostgresWarehouse, Warehouse};
