//! Dead Letter Queue for dropped records.
//!
//! Records and objects skipped under a fail-soft policy are collected per
//! invocation, returned in the response, and written as NDJSON to a
//! configurable storage location for later inspection and reprocessing.

mod queue;
mod tracker;
mod types;

pub use queue::DeadLetterQueue;
pub use tracker::FailureTracker;
pub use types::{FailureStats, RecordIssue};
