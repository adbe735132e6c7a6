//! Port interfaces for sync persistence
//!
//! One trait per local store. Every record type is keyed by its remote
//! identifier for upsert lookups; the reconciler decides between insert
//! and update, the store only executes it.

use async_trait::async_trait;
use lexflow_domain::{
    Activity, Bill, Contact, Matter, Result, SyncRun, SyncRunKind, UserProfile,
};

/// Local store for client contacts
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert_contact(&self, contact: &Contact) -> Result<()>;

    async fn update_contact(&self, contact: &Contact) -> Result<()>;

    async fn find_contact_by_remote_id(&self, remote_id: i64) -> Result<Option<Contact>>;
}

/// Local store for matters
#[async_trait]
pub trait MatterStore: Send + Sync {
    async fn insert_matter(&self, matter: &Matter) -> Result<()>;

    async fn update_matter(&self, matter: &Matter) -> Result<()>;

    async fn find_matter_by_remote_id(&self, remote_id: i64) -> Result<Option<Matter>>;
}

/// Local store for bills
#[async_trait]
pub trait BillStore: Send + Sync {
    async fn insert_bill(&self, bill: &Bill) -> Result<()>;

    async fn update_bill(&self, bill: &Bill) -> Result<()>;

    async fn find_bill_by_remote_id(&self, remote_id: i64) -> Result<Option<Bill>>;

    /// Bills currently awaiting approval, for the review queue
    async fn list_bills_awaiting_approval(&self) -> Result<Vec<Bill>>;
}

/// Local store for billed activities (one row per bill line item)
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert_activity(&self, activity: &Activity) -> Result<()>;

    async fn update_activity(&self, activity: &Activity) -> Result<()>;

    async fn find_activity_by_remote_id(&self, remote_id: i64) -> Result<Option<Activity>>;

    /// Activities attached to one local bill
    async fn list_activities_for_bill(&self, bill_id: &str) -> Result<Vec<Activity>>;
}

/// Local store for firm users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &UserProfile) -> Result<()>;

    async fn update_user(&self, user: &UserProfile) -> Result<()>;

    async fn find_user_by_remote_id(&self, remote_id: i64) -> Result<Option<UserProfile>>;
}

/// Append-only log of reconciliation passes
#[async_trait]
pub trait SyncRunStore: Send + Sync {
    /// Record a run in the running state before work starts
    async fn create_run(&self, run: &SyncRun) -> Result<()>;

    /// Close a run with its final status, counts, and error text. Called
    /// exactly once per run.
    async fn close_run(&self, run: &SyncRun) -> Result<()>;

    /// Most recent run of the given kind
    async fn latest_run(&self, kind: SyncRunKind) -> Result<Option<SyncRun>>;
}

/// String-keyed application settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Poll interval in minutes; a missing or unparsable key falls back
    /// to the built-in default
    async fn poll_interval_minutes(&self) -> Result<u32>;

    /// Whether reviewers should be notified about newly arrived bills
    async fn auto_notify(&self) -> Result<bool>;
}
