//! User repository implementation using SQLite
//!
//! Persistence for firm users synced from Clio, used for timekeeper
//! linkage and the who-am-i identity check.

use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::UserStore;
use lexflow_domain::{LexFlowError, Result as DomainResult, UserProfile};
use rusqlite::{params, Row, ToSql};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

const USER_COLUMNS: &str = "id, remote_id, name, email, enabled, created_at, updated_at";

/// SQLite-backed implementation of `UserStore`
pub struct SqliteUserRepository {
    db: Arc<DbManager>,
}

impl SqliteUserRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SqliteUserRepository {
    async fn insert_user(&self, user: &UserProfile) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user = user.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            let params: [&dyn ToSql; 7] = [
                &user.id,
                &user.remote_id,
                &user.name,
                &user.email,
                &bool_to_int(user.enabled),
                &user.created_at,
                &user.updated_at,
            ];
            conn.execute(
                "INSERT INTO users (id, remote_id, name, email, enabled, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params.as_slice(),
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_user(&self, user: &UserProfile) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user = user.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            let params: [&dyn ToSql; 6] = [
                &user.name,
                &user.email,
                &bool_to_int(user.enabled),
                &user.updated_at,
                &user.remote_id,
                &user.id,
            ];
            conn.execute(
                "UPDATE users SET name = ?1, email = ?2, enabled = ?3, updated_at = ?4,
                        remote_id = ?5
                 WHERE id = ?6",
                params.as_slice(),
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_user_by_remote_id(&self, remote_id: i64) -> DomainResult<Option<UserProfile>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<UserProfile>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE remote_id = ?1"),
                params![remote_id],
                map_user_row,
            );

            match result {
                Ok(user) => Ok(Some(user)),
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

/// Map a row to a UserProfile
fn map_user_row(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        enabled: int_to_bool(row.get(4)?),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
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

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;

    fn setup_test_db() -> (Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let manager = DbManager::new(db_path.to_str().unwrap(), 5).expect("create db manager");
        manager.run_migrations().expect("run migrations");
        (Arc::new(manager), temp_dir)
    }

    fn create_test_user() -> UserProfile {
        let now = Utc::now().timestamp();
        UserProfile {
            id: "user-local-1".into(),
            remote_id: 12,
            name: "D. Calloway".into(),
            email: Some("dcalloway@firm.example".into()),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_find_by_remote_id() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteUserRepository::new(db);
        let user = create_test_user();

        repo.insert_user(&user).await.expect("insert user");

        let found = repo.find_user_by_remote_id(12).await.expect("find user").unwrap();
        assert_eq!(found.name, "D. Calloway");
        assert!(found.enabled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_disables_user() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteUserRepository::new(db);
        let mut user = create_test_user();

        repo.insert_user(&user).await.expect("insert user");

        user.enabled = false;
        repo.update_user(&user).await.expect("update user");

        let found = repo.find_user_by_remote_id(12).await.expect("find user").unwrap();
        assert!(!found.enabled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_missing_returns_none() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteUserRepository::new(db);

        let found = repo.find_user_by_remote_id(999).await.expect("find user");
        assert!(found.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_remote_id_is_rejected() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqliteUserRepository::new(db);
        let user = create_test_user();

        repo.insert_user(&user).await.expect("insert user");

        let mut duplicate = create_test_user();
        duplicate.id = "user-local-2".into();
        let result = repo.insert_user(&duplicate).await;
        assert!(matches!(result, Err(LexFlowError::Database(_))));
    }
}
