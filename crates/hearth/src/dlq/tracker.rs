//! Failure tracking with max_failures enforcement.
//!
//! Collects the soft failures of one invocation, emits metrics for them, and
//! decides when there are too many to keep going.

use tracing::{debug, error};

use hearth_core::emit;
use hearth_core::metrics::events::RecordsRejected;

use crate::error::PipelineError;

use super::types::RecordIssue;

/// Tracks soft failures for one invocation.
#[derive(Debug)]
pub struct FailureTracker {
    issues: Vec<RecordIssue>,
    max_failures: usize,
}

impl FailureTracker {
    /// Create a new failure tracker.
    ///
    /// # Arguments
    /// * `max_failures` - Failures at which the invocation stops (0 = unlimited)
    pub fn new(max_failures: usize) -> Self {
        Self {
            issues: Vec::new(),
            max_failures,
        }
    }

    /// Record one soft failure.
    pub fn record(&mut self, issue: RecordIssue) {
        debug!(
            stage = %issue.stage,
            dataset = %issue.dataset,
            key = issue.object_key.as_deref().unwrap_or_default(),
            dropped = issue.dropped_records,
            message = %issue.message,
            "Recording soft failure"
        );
        emit!(RecordsRejected {
            count: issue.dropped_records as u64,
            stage: issue.stage.as_str(),
            dataset: issue.dataset.clone(),
        });
        self.issues.push(issue);
    }

    /// Fail once the failure count reaches `max_failures`.
    pub fn check_limit(&self) -> Result<(), PipelineError> {
        let count = self.count();
        if self.max_failures > 0 && count >= self.max_failures {
            error!("Max failures ({}) reached, stopping invocation", count);
            return Err(PipelineError::TooManyFailures {
                count,
                limit: self.max_failures,
            });
        }
        Ok(())
    }

    /// Returns the failure count.
    pub fn count(&self) -> usize {
        self.issues.len()
    }

    pub fn into_issues(self) -> Vec<RecordIssue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn issue(stage: Stage) -> RecordIssue {
        RecordIssue {
            stage,
            dataset: "expenses".into(),
            object_key: Some("d/expenses.csv".into()),
            row: Some(1),
            field: None,
            message: "bad".into(),
            dropped_records: 1,
        }
    }

    #[test]
    fn test_unlimited_when_zero() {
        let mut tracker = FailureTracker::new(0);
        for _ in 0..100 {
            tracker.record(issue(Stage::Parse));
        }
        assert!(tracker.check_limit().is_ok());
        assert_eq!(tracker.count(), 100);
    }

    #[test]
    fn test_limit_reached() {
        let mut tracker = FailureTracker::new(2);
        tracker.record(issue(Stage::Parse));
        assert!(tracker.check_limit().is_ok());

        tracker.record(issue(Stage::Normalize));
        let err = tracker.check_limit().unwrap_err();

        assert!(matches!(
            err,
            PipelineError::TooManyFailures { count: 2, limit: 2 }
        ));
    }

    #[test]
    fn test_no_failures() {
        let tracker = FailureTracker::new(5);
        assert_eq!(tracker.count(), 0);
        assert!(tracker.into_issues().is_empty());
    }
}
