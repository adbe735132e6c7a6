//! Sync run repository implementation using SQLite
//!
//! Append-only log of reconciliation passes. Rows are created in the
//! running state and closed once with their final status and counts.

use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::SyncRunStore;
use lexflow_domain::{LexFlowError, Result as DomainResult, SyncRun, SyncRunKind, SyncRunStatus};
use rusqlite::types::Type;
use rusqlite::{params, Row, ToSql};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const SYNC_RUN_COLUMNS: &str =
    "id, kind, status, records_processed, error, started_at, finished_at";

/// SQLite-backed implementation of `SyncRunStore`
pub struct SqliteSyncRunRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRunRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncRunStore for SqliteSyncRunRepository {
    async fn create_run(&self, run: &SyncRun) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let run = run.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            let kind = run.kind.to_string();
            let status = run.status.to_string();
            let params: [&dyn ToSql; 7] = [
                &run.id,
                &kind,
                &status,
                &run.records_processed,
                &run.error,
                &run.started_at,
                &run.finished_at,
            ];
            conn.execute(
                "INSERT INTO sync_runs (id, kind, status, records_processed, error,
                        started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params.as_slice(),
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn close_run(&self, run: &SyncRun) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let run = run.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            let status = run.status.to_string();
            let params: [&dyn ToSql; 5] = [
                &status,
                &run.records_processed,
                &run.error,
                &run.finished_at,
                &run.id,
            ];
            conn.execute(
                "UPDATE sync_runs SET status = ?1, records_processed = ?2, error = ?3,
                        finished_at = ?4
                 WHERE id = ?5",
                params.as_slice(),
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn latest_run(&self, kind: SyncRunKind) -> DomainResult<Option<SyncRun>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<SyncRun>> {
            let conn = db.get_connection()?;

            // Run ids are time-ordered, so they break ties within one second
            let result = conn.query_row(
                &format!(
                    "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE kind = ?1
                     ORDER BY started_at DESC, id DESC LIMIT 1"
                ),
                params![kind.to_string()],
                map_sync_run_row,
            );

            match result {
                Ok(run) => Ok(Some(run)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to a SyncRun
fn map_sync_run_row(row: &Row) -> rusqlite::Result<SyncRun> {
    let kind_raw: String = row.get(1)?;
    let kind = kind_raw
        .parse::<SyncRunKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

    let status_raw: String = row.get(2)?;
    let status = status_raw
        .parse::<SyncRunStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;

    Ok(SyncRun {
        id: row.get(0)?,
        kind,
        status,
        records_processed: row.get(3)?,
        error: row.get(4)?,
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
    })
}

// =============================================================================
// Error Mapping
// =============================================================================

fn map_sql_error(err: rusqlite::Error) -> LexFlowError {
    LexFlowError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> LexFlowError {
    LexFlowError::Internal(format!("Task join error: {err}"))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn setup_test_db() -> (Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let manager = DbManager::new(db_path.to_str().unwrap(), 5).expect("create db manager");
        manager.run_migrations().expect("run migrations");
        (Arc::new(manager), temp_dir)
    }

    fn create_test_run(kind: SyncRunKind) -> SyncRun {
        SyncRun {
            id: Uuid::now_v7().to_string(),
            kind,
            status: SyncRunStatus::Running,
            records_processed: 0,
            error: None,
            started_at: Utc::now().timestamp(),
            finished_at: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_fetch_latest() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteSyncRunRepository::new(db);
        let run = create_test_run(SyncRunKind::Bills);

        repo.create_run(&run).await.expect("create run");

        let latest = repo.latest_run(SyncRunKind::Bills).await.expect("latest run").unwrap();
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.status, SyncRunStatus::Running);
        assert!(latest.finished_at.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_records_final_status_and_counts() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteSyncRunRepository::new(db);
        let mut run = create_test_run(SyncRunKind::Bills);

        repo.create_run(&run).await.expect("create run");

        run.status = SyncRunStatus::Completed;
        run.records_processed = 24;
        run.finished_at = Some(run.started_at + 3);
        repo.close_run(&run).await.expect("close run");

        let latest = repo.latest_run(SyncRunKind::Bills).await.expect("latest run").unwrap();
        assert_eq!(latest.status, SyncRunStatus::Completed);
        assert_eq!(latest.records_processed, 24);
        assert_eq!(latest.finished_at, Some(run.started_at + 3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_latest_is_scoped_to_kind() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteSyncRunRepository::new(db);

        let bills_run = create_test_run(SyncRunKind::Bills);
        let users_run = create_test_run(SyncRunKind::Users);
        repo.create_run(&bills_run).await.expect("create bills run");
        repo.create_run(&users_run).await.expect("create users run");

        let latest_bills = repo.latest_run(SyncRunKind::Bills).await.expect("latest").unwrap();
        let latest_users = repo.latest_run(SyncRunKind::Users).await.expect("latest").unwrap();
        assert_eq!(latest_bills.id, bills_run.id);
        assert_eq!(latest_users.id, users_run.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_latest_prefers_most_recent_run() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteSyncRunRepository::new(db);

        let first = create_test_run(SyncRunKind::Bills);
        repo.create_run(&first).await.expect("create first run");

        let second = create_test_run(SyncRunKind::Bills);
        repo.create_run(&second).await.expect("create second run");

        let latest = repo.latest_run(SyncRunKind::Bills).await.expect("latest run").unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_latest_for_empty_log_is_none() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteSyncRunRepository::new(db);

        let latest = repo.latest_run(SyncRunKind::Users).await.expect("latest run");
        assert!(latest.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_run_keeps_error_text() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteSyncRunRepository::new(db);
        let mut run = create_test_run(SyncRunKind::Bills);

        repo.create_run(&run).await.expect("create run");

        run.status = SyncRunStatus::Failed;
        run.error = Some("no user with valid credentials".into());
        run.finished_at = Some(run.started_at + 1);
        repo.close_run(&run).await.expect("close run");

        let latest = repo.latest_run(SyncRunKind::Bills).await.expect("latest run").unwrap();
        assert_eq!(latest.status, SyncRunStatus::Failed);
        assert_eq!(latest.error.as_deref(), Some("no user with valid credentials"));
    }
}
