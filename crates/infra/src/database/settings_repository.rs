//! Settings repository implementation using SQLite
//!
//! String-keyed application settings with typed accessors for the values
//! the poll scheduler reads.

use std::sync::Arc;

use async_trait::async_trait;
use lexflow_core::SettingsStore;
use lexflow_domain::constants::{
    DEFAULT_POLL_INTERVAL_MINUTES, MIN_POLL_INTERVAL_MINUTES, SETTING_AUTO_NOTIFY,
    SETTING_POLL_INTERVAL_MINUTES,
};
use lexflow_domain::{LexFlowError, Result as DomainResult};
use rusqlite::params;
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite-backed implementation of `SettingsStore`
pub struct SqliteSettingsRepository {
    db: Arc<DbManager>,
}

impl SqliteSettingsRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsRepository {
    async fn get_setting(&self, key: &str) -> DomainResult<Option<String>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<String>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![&key],
                |row| row.get::<_, String>(0),
            );

            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_setting(&self, key: &str, value: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let value = value.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;

            conn.execute(
                "INSERT INTO app_settings (key, value, updated_at)
                 VALUES (?1, ?2, CAST(strftime('%s','now') AS INTEGER))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![&key, &value],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn poll_interval_minutes(&self) -> DomainResult<u32> {
        let stored = self.get_setting(SETTING_POLL_INTERVAL_MINUTES).await?;

        let minutes = match stored {
            Some(raw) => match raw.parse::<u32>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    warn!(value = %raw, "Ignoring unparsable poll interval setting");
                    DEFAULT_POLL_INTERVAL_MINUTES
                }
            },
            None => DEFAULT_POLL_INTERVAL_MINUTES,
        };

        Ok(minutes.max(MIN_POLL_INTERVAL_MINUTES))
    }

    async fn auto_notify(&self) -> DomainResult<bool> {
        let stored = self.get_setting(SETTING_AUTO_NOTIFY).await?;

        Ok(match stored.as_deref() {
            Some("true" | "1") => true,
            Some("false" | "0") => false,
            Some(other) => {
                warn!(value = %other, "Ignoring unparsable auto-notify setting");
                true
            }
            None => true,
        })
    }
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
