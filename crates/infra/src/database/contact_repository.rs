//! Contact repository implementation using SQLite
//!
//! Persistence for client contacts projected from Clio.

use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::ContactStore;
use lexflow_domain::{Contact, LexFlowError, Result as DomainResult};
use rusqlite::{params, Row, ToSql};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const CONTACT_COLUMNS: &str = "id, remote_id, name, email, created_at, updated_at";

/// SQLite-backed implementation of `ContactStore`
pub struct SqliteContactRepository {
    db: Arc<DbManager>,
}

impl SqliteContactRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContactStore for SqliteContactRepository {
    async fn insert_contact(&self, contact: &Contact) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let contact = contact.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_contact(&conn, &contact).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_contact(&self, contact: &Contact) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let contact = contact.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            let params: [&dyn ToSql; 5] = [
                &contact.name,
                &contact.email,
                &contact.updated_at,
                &contact.remote_id,
                &contact.id,
            ];
            conn.execute(
                "UPDATE contacts SET name = ?1, email = ?2, updated_at = ?3, remote_id = ?4
                 WHERE id = ?5",
                params.as_slice(),
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_contact_by_remote_id(&self, remote_id: i64) -> DomainResult<Option<Contact>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Contact>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE remote_id = ?1"),
                params![remote_id],
                map_contact_row,
            );

            match result {
                Ok(contact) => Ok(Some(contact)),
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

/// Map a row to a Contact
fn map_contact_row(row: &Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert a contact
fn insert_contact(conn: &rusqlite::Connection, contact: &Contact) -> rusqlite::Result<()> {
    let params: [&dyn ToSql; 6] = [
        &contact.id,
        &contact.remote_id,
        &contact.name,
        &contact.email,
        &contact.created_at,
        &contact.updated_at,
    ];

    conn.execute(
        "INSERT INTO contacts (id, remote_id, name, email, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
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
