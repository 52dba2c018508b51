// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes: every multi-step
//! operation (reserve + insert + enqueue, fail + refund) relies on running as
//! one transaction on that thread.

use chrono::{DateTime, Utc};
use prepodavai_config::model::StorageConfig;
use prepodavai_core::PrepodavaiError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Timestamp layout shared with `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a timestamp the way the schema stores it (lexicographically ordered).
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TS_FORMAT).to_string()
}

/// Current time in storage format.
pub fn now() -> String {
    timestamp(Utc::now())
}

/// Convert a tokio-rusqlite error into `PrepodavaiError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PrepodavaiError {
    PrepodavaiError::Storage {
        source: Box::new(e),
    }
}

/// Unwrap a domain error raised inside a `call` closure; wrap everything else.
pub fn map_call_err(e: tokio_rusqlite::Error<PrepodavaiError>) -> PrepodavaiError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => PrepodavaiError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Convert a plain rusqlite error into `PrepodavaiError::Storage`.
pub fn sql_err(e: rusqlite::Error) -> PrepodavaiError {
    PrepodavaiError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the pipeline database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` with default settings.
    pub async fn open(path: &str) -> Result<Self, PrepodavaiError> {
        Self::open_with(&StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the configured database, apply PRAGMAs, and run migrations.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, PrepodavaiError> {
        if let Some(parent) = std::path::Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PrepodavaiError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| PrepodavaiError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(config.wal_mode, config.busy_timeout_ms).await?;
        debug!(path = %config.database_path, wal = config.wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, PrepodavaiError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| PrepodavaiError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false, 0).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool, busy_timeout_ms: u64) -> Result<(), PrepodavaiError> {
        self.conn
            .call(move |conn| -> Result<(), PrepodavaiError> {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")
                        .map_err(sql_err)?;
                    conn.pragma_update(None, "synchronous", "NORMAL")
                        .map_err(sql_err)?;
                }
                conn.pragma_update(None, "foreign_keys", "ON")
                    .map_err(sql_err)?;
                conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))
                    .map_err(sql_err)?;
                run_migrations(conn)
            })
            .await
            .map_err(map_call_err)
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run `f` inside one transaction on the writer thread.
    ///
    /// The transaction commits only when `f` returns `Ok`; any error rolls
    /// back every statement `f` executed.
    pub async fn write<F, R>(&self, f: F) -> Result<R, PrepodavaiError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<R, PrepodavaiError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<R, PrepodavaiError> {
                let tx = conn.transaction().map_err(sql_err)?;
                let out = f(&tx)?;
                tx.commit().map_err(sql_err)?;
                Ok(out)
            })
            .await
            .map_err(map_call_err)
    }

    /// Run a read-only closure on the connection.
    pub async fn read<F, R>(&self, f: F) -> Result<R, PrepodavaiError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<R, PrepodavaiError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<R, PrepodavaiError> { f(conn) })
            .await
            .map_err(map_call_err)
    }

    /// Flush the WAL into the main file.
    pub async fn checkpoint(&self) -> Result<(), PrepodavaiError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), PrepodavaiError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| PrepodavaiError::Storage {
            source: e.to_string().into(),
        })?;
        debug!("database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations_and_seeds_costs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let count: i64 = db
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM credit_costs", [], |row| row.get(0))
                    .map_err(sql_err)
            })
            .await
            .unwrap();
        assert_eq!(count, 12);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let db = Database::open_in_memory().await.unwrap();
        let result: Result<(), _> = db
            .write(|tx| {
                tx.execute(
                    "INSERT INTO users (id) VALUES ('u1')",
                    [],
                )
                .map_err(sql_err)?;
                Err(PrepodavaiError::Internal("abort".into()))
            })
            .await;
        assert!(matches!(result, Err(PrepodavaiError::Internal(_))));

        let count: i64 = db
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(sql_err)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn concurrent_writers_no_sqlite_busy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("concurrent.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.write(move |tx| {
                    tx.execute(
                        "INSERT INTO users (id) VALUES (?1)",
                        rusqlite::params![format!("user-{i}")],
                    )
                    .map_err(sql_err)?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let count: i64 = db
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                    .map_err(sql_err)
            })
            .await
            .unwrap();
        assert_eq!(count, 10);
        db.close().await.unwrap();
    }

    #[test]
    fn timestamps_match_sqlite_layout() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T08:05:09.042Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2026-03-01T08:05:09.042Z");
    }
}
