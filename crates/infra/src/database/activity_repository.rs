//! Activity repository implementation using SQLite
//!
//! Persistence for billed work items behind bill line items. The approved
//! flag is owned by the local review workflow.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::ActivityStore;
use lexflow_domain::{Activity, LexFlowError, Result as DomainResult};
use rusqlite::types::Type;
use rusqlite::{params, Row, ToSql};
use rust_decimal::Decimal;
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const ACTIVITY_COLUMNS: &str = "id, remote_id, bill_id, user_id, kind, description, quantity,
            price, total, date, approved, created_at, updated_at";

/// SQLite-backed implementation of `ActivityStore`
pub struct SqliteActivityRepository {
    db: Arc<DbManager>,
}

impl SqliteActivityRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityStore for SqliteActivityRepository {
    async fn insert_activity(&self, activity: &Activity) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let activity = activity.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_activity(&conn, &activity).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_activity(&self, activity: &Activity) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let activity = activity.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_activity(&conn, &activity).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_activity_by_remote_id(&self, remote_id: i64) -> DomainResult<Option<Activity>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Activity>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE remote_id = ?1"),
                params![remote_id],
                map_activity_row,
            );

            match result {
                Ok(activity) => Ok(Some(activity)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_activities_for_bill(&self, bill_id: &str) -> DomainResult<Vec<Activity>> {
        let db = Arc::clone(&self.db);
        let bill_id = bill_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<Activity>> {
            let conn = db.get_connection()?;

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE bill_id = ?1
                     ORDER BY remote_id ASC"
                ))
                .map_err(map_sql_error)?;

            let rows = stmt.query_map(params![&bill_id], map_activity_row).map_err(map_sql_error)?;

            rows.collect::<rusqlite::Result<Vec<Activity>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to an Activity
fn map_activity_row(row: &Row) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        bill_id: row.get(2)?,
        user_id: row.get(3)?,
        kind: row.get(4)?,
        description: row.get(5)?,
        quantity: decimal_column(row, 6)?,
        price: decimal_column(row, 7)?,
        total: decimal_column(row, 8)?,
        date: date_column(row, 9)?,
        approved: int_to_bool(row.get(10)?),
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Insert an activity
fn insert_activity(conn: &rusqlite::Connection, activity: &Activity) -> rusqlite::Result<()> {
    let quantity = activity.quantity.to_string();
    let price = activity.price.to_string();
    let total = activity.total.to_string();
    let date = activity.date.map(|d| d.to_string());

    let params: [&dyn ToSql; 13] = [
        &activity.id,
        &activity.remote_id,
        &activity.bill_id,
        &activity.user_id,
        &activity.kind,
        &activity.description,
        &quantity,
        &price,
        &total,
        &date,
        &bool_to_int(activity.approved),
        &activity.created_at,
        &activity.updated_at,
    ];

    conn.execute(
        "INSERT INTO activities (id, remote_id, bill_id, user_id, kind, description, quantity,
                price, total, date, approved, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params.as_slice(),
    )?;

    Ok(())
}

/// Update an activity
fn update_activity(conn: &rusqlite::Connection, activity: &Activity) -> rusqlite::Result<()> {
    let quantity = activity.quantity.to_string();
    let price = activity.price.to_string();
    let total = activity.total.to_string();
    let date = activity.date.map(|d| d.to_string());

    let params: [&dyn ToSql; 12] = [
        &activity.bill_id,
        &activity.user_id,
        &activity.kind,
        &activity.description,
        &quantity,
        &price,
        &total,
        &date,
        &bool_to_int(activity.approved),
        &activity.updated_at,
        &activity.remote_id,
        &activity.id, // WHERE clause
    ];

    conn.execute(
        "UPDATE activities SET
            bill_id = ?1, user_id = ?2, kind = ?3, description = ?4, quantity = ?5,
            price = ?6, total = ?7, date = ?8, approved = ?9, updated_at = ?10,
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
// Utility Functions
// =============================================================================

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64) -> bool {
    value != 0
}

// =============================================================================
// Tests
// =============================================================================
