//! Sync reconciler
//!
//! Pulls remote Clio records and reconciles them against local rows by
//! remote id, cascading related entities in dependency order: contact
//! before matter before bill before line items, with user resolution for
//! timekeeper linkage. Passes are best-effort; one bill's failure is
//! recorded in the error list and the remaining bills continue.

use std::sync::Arc;

use chrono::Utc;
use lexflow_domain::constants::{ERROR_TRUNCATE_SUFFIX, MAX_ERROR_MESSAGE_LENGTH};
use lexflow_domain::{
    Activity, Bill, BillListFilter, BillState, ClioBill, ClioLineItem, ClioUser, Contact,
    LexFlowError, Matter, Result, SyncFailure, SyncReport, SyncRun, SyncRunKind, SyncRunStatus,
    UserProfile,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clio_ports::BillingRemote;
use crate::sync::ports::{
    ActivityStore, BillStore, ContactStore, MatterStore, SyncRunStore, UserStore,
};

/// Whether an upsert created a new row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChange {
    Created,
    Updated,
}

/// Store handles the reconciler writes through
#[derive(Clone)]
pub struct SyncStores {
    pub contacts: Arc<dyn ContactStore>,
    pub matters: Arc<dyn MatterStore>,
    pub bills: Arc<dyn BillStore>,
    pub activities: Arc<dyn ActivityStore>,
    pub users: Arc<dyn UserStore>,
    pub runs: Arc<dyn SyncRunStore>,
}

/// Reconciles remote Clio records into the local store
///
/// Running the same reconciliation twice against unchanged remote data is
/// idempotent: no new rows, identical field values.
pub struct SyncReconciler {
    remote: Arc<dyn BillingRemote>,
    stores: SyncStores,
}

impl SyncReconciler {
    pub fn new(remote: Arc<dyn BillingRemote>, stores: SyncStores) -> Self {
        Self { remote, stores }
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Reconcile every remote bill awaiting approval into the local store
    ///
    /// The pass is bracketed by a sync run log entry. Failing to fetch
    /// the working set itself (no valid credentials, remote down past the
    /// retry budget) is fatal to the whole pass; anything after that is
    /// caught per bill.
    pub async fn run_bill_pass(&self) -> Result<SyncReport> {
        let run = self.open_run(SyncRunKind::Bills).await?;

        let bills = match self.remote.list_bills(&BillListFilter::awaiting_approval()).await {
            Ok(bills) => bills,
            Err(e) => {
                self.fail_run(run, &e).await;
                return Err(e);
            }
        };

        info!(count = bills.len(), "Reconciling bills awaiting approval");

        let mut report = SyncReport::default();
        for bill in &bills {
            report.records_processed = report.records_processed.saturating_add(1);
            match self.reconcile_bill(bill).await {
                Ok(RecordChange::Created) => {
                    report.records_created = report.records_created.saturating_add(1);
                }
                Ok(RecordChange::Updated) => {
                    report.records_updated = report.records_updated.saturating_add(1);
                }
                Err(e) => {
                    warn!(bill_id = bill.id, error = %e, "Bill reconciliation failed");
                    report.errors.push(SyncFailure {
                        remote_id: bill.id,
                        message: truncate_error(&e.to_string()),
                    });
                }
            }
        }

        report.success = report.errors.is_empty();
        info!(
            processed = report.records_processed,
            created = report.records_created,
            updated = report.records_updated,
            failed = report.errors.len(),
            "Bill pass finished"
        );

        self.finish_run(run, &report).await?;
        Ok(report)
    }

    /// Reconcile all firm users into the local store
    pub async fn run_user_pass(&self) -> Result<SyncReport> {
        let run = self.open_run(SyncRunKind::Users).await?;

        let users = match self.remote.list_users().await {
            Ok(users) => users,
            Err(e) => {
                self.fail_run(run, &e).await;
                return Err(e);
            }
        };

        info!(count = users.len(), "Reconciling firm users");

        let mut report = SyncReport::default();
        for user in &users {
            report.records_processed = report.records_processed.saturating_add(1);
            match self.upsert_user(user).await {
                Ok((_, RecordChange::Created)) => {
                    report.records_created = report.records_created.saturating_add(1);
                }
                Ok((_, RecordChange::Updated)) => {
                    report.records_updated = report.records_updated.saturating_add(1);
                }
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "User reconciliation failed");
                    report.errors.push(SyncFailure {
                        remote_id: user.id,
                        message: truncate_error(&e.to_string()),
                    });
                }
            }
        }

        report.success = report.errors.is_empty();
        self.finish_run(run, &report).await?;
        Ok(report)
    }

    // ========================================================================
    // Single-record entry points
    // ========================================================================

    /// Fetch one bill and reconcile it, returning whether the local row
    /// was created or updated
    pub async fn sync_bill(&self, remote_id: i64) -> Result<RecordChange> {
        let payload = self.remote.get_bill(remote_id).await?;
        self.reconcile_bill(&payload).await
    }

    /// Fetch one contact and upsert its local row, returning the local id
    pub async fn sync_contact(&self, remote_id: i64) -> Result<String> {
        let payload = self.remote.get_contact(remote_id).await?;
        let now = Utc::now().timestamp();

        let mut row = Contact {
            id: Uuid::now_v7().to_string(),
            remote_id: payload.id,
            name: payload.name.clone().unwrap_or_default(),
            email: payload.primary_email_address.clone(),
            created_at: now,
            updated_at: now,
        };

        match self.stores.contacts.find_contact_by_remote_id(payload.id).await? {
            Some(existing) => {
                row.id = existing.id;
                row.created_at = existing.created_at;
                self.stores.contacts.update_contact(&row).await?;
            }
            None => self.stores.contacts.insert_contact(&row).await?,
        }
        Ok(row.id)
    }

    /// Fetch one matter and upsert its local row, pulling the client it
    /// references first. Returns the local id.
    pub async fn sync_matter(&self, remote_id: i64) -> Result<String> {
        let payload = self.remote.get_matter(remote_id).await?;

        let contact_id = match payload.client.as_ref() {
            Some(client) => self.resolve_contact(client.id).await,
            None => None,
        };

        let now = Utc::now().timestamp();
        let mut row = Matter {
            id: Uuid::now_v7().to_string(),
            remote_id: payload.id,
            contact_id,
            display_number: payload.display_number.clone(),
            description: payload.description.clone(),
            status: payload.status.clone(),
            created_at: now,
            updated_at: now,
        };

        match self.stores.matters.find_matter_by_remote_id(payload.id).await? {
            Some(existing) => {
                row.id = existing.id;
                row.created_at = existing.created_at;
                self.stores.matters.update_matter(&row).await?;
            }
            None => self.stores.matters.insert_matter(&row).await?,
        }
        Ok(row.id)
    }

    /// Fetch one user and upsert its local row, returning the local id
    pub async fn sync_user(&self, remote_id: i64) -> Result<String> {
        let payload = self.remote.get_user(remote_id).await?;
        let (local_id, _) = self.upsert_user(&payload).await?;
        Ok(local_id)
    }

    // ========================================================================
    // Reconciliation internals
    // ========================================================================

    /// Upsert one bill payload plus its related records
    ///
    /// Resolution order: client contact, then matter, then the bill row,
    /// then its line items. A parent that fails to resolve leaves a null
    /// foreign key instead of failing the bill.
    async fn reconcile_bill(&self, payload: &ClioBill) -> Result<RecordChange> {
        let contact_id = match payload.client.as_ref() {
            Some(client) => self.resolve_contact(client.id).await,
            None => None,
        };
        let matter_id = match payload.matter.as_ref() {
            Some(matter) => self.resolve_matter(matter.id).await,
            None => None,
        };

        let state = parse_bill_state(payload)?;
        let now = Utc::now().timestamp();

        let mut row = Bill {
            id: Uuid::now_v7().to_string(),
            remote_id: payload.id,
            number: payload.number.clone(),
            contact_id,
            matter_id,
            state,
            total: payload.total.unwrap_or(Decimal::ZERO),
            balance: payload.balance.unwrap_or(Decimal::ZERO),
            issued_at: payload.issued_at,
            due_at: payload.due_at,
            etag: payload.etag.clone(),
            created_at: now,
            updated_at: now,
        };

        let change = match self.stores.bills.find_bill_by_remote_id(payload.id).await? {
            Some(existing) => {
                row.id = existing.id;
                row.created_at = existing.created_at;
                self.stores.bills.update_bill(&row).await?;
                RecordChange::Updated
            }
            None => {
                self.stores.bills.insert_bill(&row).await?;
                RecordChange::Created
            }
        };

        self.sync_line_items(payload.id, &row.id).await?;
        Ok(change)
    }

    /// Fetch every line item for a bill and upsert one activity row per
    /// item. The nested activity id is the dedup key when present, else
    /// the line item id itself.
    async fn sync_line_items(&self, bill_remote_id: i64, bill_local_id: &str) -> Result<()> {
        let items = self.remote.list_bill_line_items(bill_remote_id).await?;

        for item in &items {
            let user_id = match item.user.as_ref() {
                Some(user) => self.resolve_user(user.id).await,
                None => None,
            };
            self.upsert_line_item(item, bill_local_id, user_id).await?;
        }
        Ok(())
    }

    async fn upsert_line_item(
        &self,
        item: &ClioLineItem,
        bill_local_id: &str,
        user_id: Option<String>,
    ) -> Result<()> {
        let dedup_id = item.activity.as_ref().map_or(item.id, |a| a.id);
        let now = Utc::now().timestamp();

        let mut row = Activity {
            id: Uuid::now_v7().to_string(),
            remote_id: dedup_id,
            bill_id: Some(bill_local_id.to_string()),
            user_id,
            kind: item.kind.clone(),
            description: item.description.clone(),
            quantity: item.quantity.unwrap_or(Decimal::ZERO),
            price: item.price.unwrap_or(Decimal::ZERO),
            total: item.total.unwrap_or(Decimal::ZERO),
            date: item.date,
            approved: false,
            created_at: now,
            updated_at: now,
        };

        match self.stores.activities.find_activity_by_remote_id(dedup_id).await? {
            Some(existing) => {
                row.id = existing.id;
                row.created_at = existing.created_at;
                // An approval granted locally survives later syncs
                row.approved = existing.approved;
                self.stores.activities.update_activity(&row).await?;
            }
            None => self.stores.activities.insert_activity(&row).await?,
        }
        Ok(())
    }

    async fn upsert_user(&self, payload: &ClioUser) -> Result<(String, RecordChange)> {
        let now = Utc::now().timestamp();
        let mut row = UserProfile {
            id: Uuid::now_v7().to_string(),
            remote_id: payload.id,
            name: payload.name.clone().unwrap_or_default(),
            email: payload.email.clone(),
            enabled: payload.enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let change = match self.stores.users.find_user_by_remote_id(payload.id).await? {
            Some(existing) => {
                row.id = existing.id;
                row.created_at = existing.created_at;
                self.stores.users.update_user(&row).await?;
                RecordChange::Updated
            }
            None => {
                self.stores.users.insert_user(&row).await?;
                RecordChange::Created
            }
        };
        Ok((row.id, change))
    }

    // ========================================================================
    // Foreign key resolution
    // ========================================================================

    /// Sync the referenced contact and return its local id, or null the
    /// foreign key when resolution fails
    async fn resolve_contact(&self, remote_id: i64) -> Option<String> {
        match self.sync_contact(remote_id).await {
            Ok(local_id) => Some(local_id),
            Err(e) => {
                warn!(
                    contact_id = remote_id,
                    error = %e,
                    "Contact resolution failed, leaving foreign key null"
                );
                None
            }
        }
    }

    /// Sync the referenced matter and return its local id, or null the
    /// foreign key when resolution fails
    async fn resolve_matter(&self, remote_id: i64) -> Option<String> {
        match self.sync_matter(remote_id).await {
            Ok(local_id) => Some(local_id),
            Err(e) => {
                warn!(
                    matter_id = remote_id,
                    error = %e,
                    "Matter resolution failed, leaving foreign key null"
                );
                None
            }
        }
    }

    /// Sync the referenced user and return its local id, or null the
    /// foreign key when resolution fails
    async fn resolve_user(&self, remote_id: i64) -> Option<String> {
        match self.sync_user(remote_id).await {
            Ok(local_id) => Some(local_id),
            Err(e) => {
                warn!(
                    user_id = remote_id,
                    error = %e,
                    "User resolution failed, leaving foreign key null"
                );
                None
            }
        }
    }

    // ========================================================================
    // Sync run bracketing
    // ========================================================================

    async fn open_run(&self, kind: SyncRunKind) -> Result<SyncRun> {
        let run = SyncRun {
            id: Uuid::now_v7().to_string(),
            kind,
            status: SyncRunStatus::Running,
            records_processed: 0,
            error: None,
            started_at: Utc::now().timestamp(),
            finished_at: None,
        };
        self.stores.runs.create_run(&run).await?;
        Ok(run)
    }

    async fn finish_run(&self, mut run: SyncRun, report: &SyncReport) -> Result<()> {
        run.status = if report.success { SyncRunStatus::Completed } else { SyncRunStatus::Failed };
        run.records_processed = report.records_processed;
        run.error = report.error_summary().map(|summary| truncate_error(&summary));
        run.finished_at = Some(Utc::now().timestamp());
        self.stores.runs.close_run(&run).await
    }

    /// Close a run as failed when the pass dies before its loop starts
    async fn fail_run(&self, mut run: SyncRun, error: &LexFlowError) {
        run.status = SyncRunStatus::Failed;
        run.error = Some(truncate_error(&error.to_string()));
        run.finished_at = Some(Utc::now().timestamp());
        if let Err(close_err) = self.stores.runs.close_run(&run).await {
            warn!(
                run_id = %run.id,
                error = %close_err,
                "Failed to close sync run after fatal error"
            );
        }
    }
}

fn parse_bill_state(payload: &ClioBill) -> Result<BillState> {
    match payload.state.as_deref() {
        Some(s) => s.parse::<BillState>().map_err(LexFlowError::InvalidInput),
        None => Err(LexFlowError::InvalidInput(format!("bill {} has no state", payload.id))),
    }
}

/// Truncate an error message for storage in the error list and run log
fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
        return message.to_string();
    }
    let cut = MAX_ERROR_MESSAGE_LENGTH.saturating_sub(ERROR_TRUNCATE_SUFFIX.len());
    let truncated: String = message.chars().take(cut).collect();
    format!("{truncated}{ERROR_TRUNCATE_SUFFIX}")
}

// ============================================================================
// Tests
// ============================================================================
