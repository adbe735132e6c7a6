//! Matter repository implementation using SQLite
//!
//! Persistence for legal matters projected from Clio. The owning client is
//! stored as a nullable local contact id.

use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::MatterStore;
use lexflow_domain::{LexFlowError, Matter, Result as DomainResult};
use rusqlite::{params, Row, ToSql};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const MATTER_COLUMNS: &str =
    "id, remote_id, contact_id, display_number, description, status, created_at, updated_at";

/// SQLite-backed implementation of `MatterStore`
pub struct SqliteMatterRepository {
    db: Arc<DbManager>,
}

impl SqliteMatterRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MatterStore for SqliteMatterRepository {
    async fn insert_matter(&self, matter: &Matter) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let matter = matter.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_matter(&conn, &matter).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_matter(&self, matter: &Matter) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let matter = matter.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            let params: [&dyn ToSql; 7] = [
                &matter.contact_id,
                &matter.display_number,
                &matter.description,
                &matter.status,
                &matter.updated_at,
                &matter.remote_id,
                &matter.id,
            ];
            conn.execute(
                "UPDATE matters SET contact_id = ?1, display_number = ?2, description = ?3,
                        status = ?4, updated_at = ?5, remote_id = ?6
                 WHERE id = ?7",
                params.as_slice(),
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_matter_by_remote_id(&self, remote_id: i64) -> DomainResult<Option<Matter>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Matter>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {MATTER_COLUMNS} FROM matters WHERE remote_id = ?1"),
                params![remote_id],
                map_matter_row,
            );

            match result {
                Ok(matter) => Ok(Some(matter)),
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

/// Map a row to a Matter
fn map_matter_row(row: &Row) -> rusqlite::Result<Matter> {
    Ok(Matter {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        contact_id: row.get(2)?,
        display_number: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Insert a matter
fn insert_matter(conn: &rusqlite::Connection, matter: &Matter) -> rusqlite::Result<()> {
    let params: [&dyn ToSql; 8] = [
        &matter.id,
        &matter.remote_id,
        &matter.contact_id,
        &matter.display_number,
        &matter.description,
        &matter.status,
        &matter.created_at,
        &matter.updated_at,
    ];

    conn.execute(
        "INSERT INTO matters (id, remote_id, contact_id, display_number, description, status,
                created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params.as_slice(),
    )?;

    Ok(())
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
