//! Local record types persisted in SQLite
//!
//! Each row is a projection of a remote Clio entity, keyed by `remote_id`
//! (at most one row per remote identifier). Remote deletion or voiding is
//! reflected through status fields, never by removing the local row.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Status Enums
// ============================================================================

/// Lifecycle state of a bill as reported by Clio
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillState {
    Draft,
    AwaitingApproval,
    AwaitingPayment,
    Paid,
    Void,
    Deleted,
}

crate::impl_domain_status_conversions!(BillState {
    Draft => "draft",
    AwaitingApproval => "awaiting_approval",
    AwaitingPayment => "awaiting_payment",
    Paid => "paid",
    Void => "void",
    Deleted => "deleted",
});

/// Which remote working set a reconciliation pass covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunKind {
    Users,
    Bills,
}

crate::impl_domain_status_conversions!(SyncRunKind {
    Users => "users",
    Bills => "bills",
});

/// Lifecycle status of a sync run log entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
}

crate::impl_domain_status_conversions!(SyncRunStatus {
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

// ============================================================================
// Local Records
// ============================================================================

/// Client (person or company) projected from a Clio contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub remote_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Legal matter projected from a Clio matter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matter {
    pub id: String,
    pub remote_id: i64,
    /// Local id of the owning client contact; null when resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Invoice projected from a Clio bill
///
/// Monetary amounts are decimal-precise; binary floating point is never
/// used for money anywhere in the sync path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub remote_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Local id of the billed client; null when resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Local id of the billed matter; null when resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matter_id: Option<String>,
    pub state: BillState,
    pub total: Decimal,
    pub balance: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<NaiveDate>,
    /// Concurrency token from the most recent remote read, forwarded on
    /// writes so the remote side can reject stale updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Billed work item (time or expense entry) behind one bill line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    /// Nested activity id when the line item carries one, else the line
    /// item id itself
    pub remote_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    /// Local id of the timekeeper; null when resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Approval flag owned by the local workflow. Reconciliation may set
    /// this on create (false) but never flips an approved entry back.
    pub approved: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Firm user projected from a Clio user (timekeeper linkage + who-am-i)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub remote_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Log entry bracketing one reconciliation pass
///
/// Created as `Running` before work starts and closed exactly once when
/// the pass ends; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub kind: SyncRunKind,
    pub status: SyncRunStatus,
    pub records_processed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
}

impl SyncRun {
    /// Convert start timestamp to DateTime<Utc>
    pub fn started_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.started_at, 0).single().unwrap_or_else(Utc::now)
    }

    /// Convert finish timestamp to DateTime<Utc>, if the run has closed
    pub fn finished_at_utc(&self) -> Option<DateTime<Utc>> {
        self.finished_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}
