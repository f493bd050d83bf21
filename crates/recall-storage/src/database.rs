// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: the [`Database`] IS the single writer. Do NOT create additional
//! `Connection` instances for writes against the same file.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::debug;

use recall_core::RecallError;

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into the storage error variant.
pub(crate) fn storage_err(e: tokio_rusqlite::Error) -> RecallError {
    RecallError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection backing the store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply connection PRAGMAs,
    /// and run pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RecallError> {
        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|e| storage_err(e.into()))?;
        let db = Self { conn };
        db.configure().await?;
        debug!(path = %path.as_ref().display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database with the full schema applied. Test use.
    pub async fn open_in_memory() -> Result<Self, RecallError> {
        let conn = Connection::open_in_memory().await.map_err(|e| storage_err(e.into()))?;
        let db = Self { conn };
        db.configure().await?;
        Ok(db)
    }

    async fn configure(&self) -> Result<(), RecallError> {
        let migration_result = self
            .conn
            .call(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                Ok(run_migrations(conn))
            })
            .await
            .map_err(storage_err)?;
        migration_result.map_err(|e| RecallError::Storage {
            source: Box::new(e),
        })
    }

    /// The underlying tokio-rusqlite connection handle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL into the main database file.
    ///
    /// Called on shutdown; `EntryStore::optimize` also checkpoints as part
    /// of its maintenance cycle.
    pub async fn checkpoint(&self) -> Result<(), RecallError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(storage_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
