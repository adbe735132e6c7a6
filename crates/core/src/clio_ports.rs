//! Port interface for the Clio remote API
//!
//! The reconciler talks to Clio exclusively through this trait. The
//! implementation owns authentication, rate limiting, bounded retries,
//! and pagination; callers never observe transient failures that are
//! still inside the retry budget.

use async_trait::async_trait;
use lexflow_domain::{
    BillListFilter, ClioBill, ClioContact, ClioLineItem, ClioMatter, ClioUser, Result,
};

/// Read-side Clio operations the sync engine depends on
#[async_trait]
pub trait BillingRemote: Send + Sync {
    /// Fetch the user the current credentials belong to
    async fn who_am_i(&self) -> Result<ClioUser>;

    /// Fetch one user by remote id
    async fn get_user(&self, id: i64) -> Result<ClioUser>;

    /// Fetch all firm users (fully paginated)
    async fn list_users(&self) -> Result<Vec<ClioUser>>;

    /// Fetch one contact by remote id
    async fn get_contact(&self, id: i64) -> Result<ClioContact>;

    /// Fetch one matter by remote id
    async fn get_matter(&self, id: i64) -> Result<ClioMatter>;

    /// Fetch one bill by remote id
    async fn get_bill(&self, id: i64) -> Result<ClioBill>;

    /// Fetch all bills matching the filter (fully paginated)
    async fn list_bills(&self, filter: &BillListFilter) -> Result<Vec<ClioBill>>;

    /// Fetch every line item on one bill (fully paginated)
    async fn list_bill_line_items(&self, bill_id: i64) -> Result<Vec<ClioLineItem>>;
}
