//! Bill repository implementation using SQLite
//!
//! Persistence for invoices projected from Clio. Money columns store exact
//! decimal strings; they are never converted through binary floating point.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::BillStore;
use lexflow_domain::{Bill, BillState, LexFlowError, Result as DomainResult};
use rusqlite::types::Type;
use rusqlite::{params, Row, ToSql};
use rust_decimal::Decimal;
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const BILL_COLUMNS: &str = "id, remote_id, number, contact_id, matter_id, state, total, balance,
            issued_at, due_at, etag, created_at, updated_at";

/// SQLite-backed implementation of `BillStore`
pub struct SqliteBillRepository {
    db: Arc<DbManager>,
}

impl SqliteBillRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BillStore for SqliteBillRepository {
    async fn insert_bill(&self, bill: &Bill) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let bill = bill.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_bill(&conn, &bill).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_bill(&self, bill: &Bill) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let bill = bill.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_bill(&conn, &bill).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_bill_by_remote_id(&self, remote_id: i64) -> DomainResult<Option<Bill>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Bill>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {BILL_COLUMNS} FROM bills WHERE remote_id = ?1"),
                params![remote_id],
                map_bill_row,
            );

            match result {
                Ok(bill) => Ok(Some(bill)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_bills_awaiting_approval(&self) -> DomainResult<Vec<Bill>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Bill>> {
            let conn = db.get_connection()?;

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {BILL_COLUMNS} FROM bills WHERE state = ?1 ORDER BY created_at ASC"
                ))
                .map_err(map_sql_error)?;

            let rows = stmt
                .query_map(params![BillState::AwaitingApproval.to_string()], map_bill_row)
                .map_err(map_sql_error)?;

            rows.collect::<rusqlite::Result<Vec<Bill>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to a Bill
fn map_bill_row(row: &Row) -> rusqlite::Result<Bill> {
    let state_raw: String = row.get(5)?;
    let state = state_raw
        .parse::<BillState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    Ok(Bill {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        number: row.get(2)?,
        contact_id: row.get(3)?,
        matter_id: row.get(4)?,
        state,
        total: decimal_column(row, 6)?,
        balance: decimal_column(row, 7)?,
        issued_at: date_column(row, 8)?,
        due_at: date_column(row, 9)?,
        etag: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Insert a bill
fn insert_bill(conn: &rusqlite::Connection, bill: &Bill) -> rusqlite::Result<()> {
    let state = bill.state.to_string();
    let total = bill.total.to_string();
    let balance = bill.balance.to_string();
    let issued_at = bill.issued_at.map(|d| d.to_string());
    let due_at = bill.due_at.map(|d| d.to_string());

    let params: [&dyn ToSql; 13] = [
        &bill.id,
        &bill.remote_id,
        &bill.number,
        &bill.contact_id,
        &bill.matter_id,
        &state,
        &total,
        &balance,
        &issued_at,
        &due_at,
        &bill.etag,
        &bill.created_at,
        &bill.updated_at,
    ];

    conn.execute(
        "INSERT INTO bills (id, remote_id, number, contact_id, matter_id, state, total, balance,
                issued_at, due_at, etag, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params.as_slice(),
    )?;

    Ok(())
}

/// Update a bill
fn update_bill(conn: &rusqlite::Connection, bill: &Bill) -> rusqlite::Result<()> {
    let state = bill.state.to_string();
    let total = bill.total.to_string();
    let balance = bill.balance.to_string();
    let issued_at = bill.issued_at.map(|d| d.to_string());
    let due_at = bill.due_at.map(|d| d.to_string());

    let params: [&dyn ToSql; 12] = [
        &bill.number,
        &bill.contact_id,
        &bill.matter_id,
        &state,
        &total,
        &balance,
        &issued_at,
        &due_at,
        &bill.etag,
        &bill.updated_at,
        &bill.remote_id,
        &bill.id, // WHERE clause
    ];

    conn.execute(
        "UPDATE bills SET
            number = ?1, contact_id = ?2, matter_id = ?3, state = ?4, total = ?5,
            balance = ?6, issued_at = ?7, due_at = ?8, etag = ?9, updated_at = ?10,
            remote_id = ?11
         WHERE id = ?12",
        params.as_slice(),
    )?;

    Ok(())
}

fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<chrono::NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
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
    use chrono::{NaiveDate, Utc};
    use tempfile::TempDir;

    use super::*;

    fn setup_test_db() -> (Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let manager = DbManager::new(db_path.to_str().unwrap(), 5).expect("create db manager");
        manager.run_migrations().expect("run migrations");
        (Arc::new(manager), temp_dir)
    }

    fn create_test_bill(remote_id: i64, state: BillState) -> Bill {
        let now = Utc::now().timestamp();
        Bill {
            id: format!("bill-local-{remote_id}"),
            remote_id,
            number: Some(format!("INV-{remote_id}")),
            contact_id: Some("contact-local-1".into()),
            matter_id: None,
            state,
            total: Decimal::from_str("1250.75").unwrap(),
            balance: Decimal::from_str("1250.75").unwrap(),
            issued_at: NaiveDate::from_ymd_opt(2026, 1, 15),
            due_at: None,
            etag: Some("\"1-a7f\"".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_find_preserves_decimal_precision() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteBillRepository::new(db);
        let bill = create_test_bill(9001, BillState::AwaitingApproval);

        repo.insert_bill(&bill).await.expect("insert bill");

        let found = repo.find_bill_by_remote_id(9001).await.expect("find bill").unwrap();
        assert_eq!(found.total, Decimal::from_str("1250.75").unwrap());
        assert_eq!(found.balance.to_string(), "1250.75");
        assert_eq!(found.state, BillState::AwaitingApproval);
        assert_eq!(found.issued_at, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert!(found.due_at.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_moves_state_forward() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteBillRepository::new(db);
        let mut bill = create_test_bill(9001, BillState::AwaitingApproval);

        repo.insert_bill(&bill).await.expect("insert bill");

        bill.state = BillState::AwaitingPayment;
        bill.balance = Decimal::from_str("0.00").unwrap();
        bill.etag = Some("\"2-b81\"".into());
        repo.update_bill(&bill).await.expect("update bill");

        let found = repo.find_bill_by_remote_id(9001).await.expect("find bill").unwrap();
        assert_eq!(found.state, BillState::AwaitingPayment);
        assert_eq!(found.balance, Decimal::from_str("0.00").unwrap());
        assert_eq!(found.etag.as_deref(), Some("\"2-b81\""));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_awaiting_approval_filters_by_state() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteBillRepository::new(db);

        repo.insert_bill(&create_test_bill(1, BillState::AwaitingApproval))
            .await
            .expect("insert bill 1");
        repo.insert_bill(&create_test_bill(2, BillState::Paid)).await.expect("insert bill 2");
        repo.insert_bill(&create_test_bill(3, BillState::AwaitingApproval))
            .await
            .expect("insert bill 3");

        let queue = repo.list_bills_awaiting_approval().await.expect("list bills");

        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|b| b.state == BillState::AwaitingApproval));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_remote_id_is_rejected() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteBillRepository::new(db);

        repo.insert_bill(&create_test_bill(9001, BillState::AwaitingApproval))
            .await
            .expect("insert bill");

        let mut duplicate = create_test_bill(9001, BillState::Draft);
        duplicate.id = "bill-local-other".into();
        let result = repo.insert_bill(&duplicate).await;

        match result {
            Err(LexFlowError::Database(msg)) => assert!(msg.contains("unique")),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }
}
