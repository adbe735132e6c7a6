//! Reconciliation reporting types
//!
//! Shapes handed back to callers of the reconciler and the poll
//! scheduler for surfacing pass results to reviewers.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One entity failure captured during a best-effort pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    /// Remote id of the record that failed
    pub remote_id: i64,
    pub message: String,
}

/// Aggregate result of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// True when the pass finished with an empty error list
    pub success: bool,
    pub records_processed: u32,
    pub records_created: u32,
    pub records_updated: u32,
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    /// Concatenated error text for the sync run log, `None` when clean
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let joined = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.remote_id, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }
}

/// Result of one scheduler-driven pass, including the new-bill count the
/// approval workflow surfaces to reviewers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassOutcome {
    pub report: SyncReport,
    pub new_bills: u32,
    pub completed_at: i64,
}

impl PassOutcome {
    /// Convert completion timestamp to DateTime<Utc>
    pub fn completed_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.completed_at, 0).single().unwrap_or_else(Utc::now)
    }
}

/// Scheduler status snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollStatus {
    /// Whether the repeating timer is currently active
    pub active: bool,
    /// Outcome of the most recently completed pass, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass: Option<PassOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_summary_joins_failures_in_order() {
        let report = SyncReport {
            success: false,
            records_processed: 5,
            records_created: 3,
            records_updated: 1,
            errors: vec![
                SyncFailure { remote_id: 301, message: "fetch failed".to_string() },
                SyncFailure { remote_id: 305, message: "bad state".to_string() },
            ],
        };

        assert_eq!(report.error_summary().unwrap(), "301: fetch failed; 305: bad state");
    }

    #[test]
    fn test_error_summary_none_when_clean() {
        let report = SyncReport { success: true, ..SyncReport::default() };
        assert!(report.error_summary().is_none());
    }
}
