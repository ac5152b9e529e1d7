//! SQLite-backed credential store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::{CredentialRecord, CredentialStore};
use crate::error::GateError;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS credentials (
    kind TEXT NOT NULL,
    user_id TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (kind, user_id)
);

CREATE INDEX IF NOT EXISTS idx_credentials_user ON credentials(user_id);
"#;

/// Credential store persisted to a single SQLite database.
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open (or create) the database at `db_path` and run the schema.
    pub async fn new(db_path: PathBuf) -> Result<Self, GateError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(GateError::store)?;
            }
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, rusqlite::Error>(conn)
        })
        .await
        .map_err(GateError::store)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, GateError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(GateError::store)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, kind: &str, user_id: &str) -> Result<Option<CredentialRecord>, GateError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT value, created_at, updated_at FROM credentials
                 WHERE kind = ?1 AND user_id = ?2",
                params![kind, user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((value, created_at, updated_at)) => Ok(Some(CredentialRecord {
                value: serde_json::from_str(&value).map_err(GateError::store)?,
                created_at: Self::parse_timestamp(&created_at)?,
                updated_at: Self::parse_timestamp(&updated_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        kind: &str,
        user_id: &str,
        value: serde_json::Value,
    ) -> Result<(), GateError> {
        let serialized = serde_json::to_string(&value).map_err(GateError::store)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO credentials (kind, user_id, value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(kind, user_id) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![kind, user_id, serialized, now],
        )?;

        tracing::debug!(kind, user_id, "Stored credential record");
        Ok(())
    }

    async fn delete(&self, kind: &str, user_id: &str) -> Result<(), GateError> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM credentials WHERE kind = ?1 AND user_id = ?2",
            params![kind, user_id],
        )?;

        if removed > 0 {
            tracing::debug!(kind, user_id, "Deleted credential record");
        }
        Ok(())
    }
}
