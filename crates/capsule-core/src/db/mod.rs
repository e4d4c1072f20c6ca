//! SQLite storage engine for capsules
//!
//! Each [`Database`] owns one connection. Concurrent callers open their own
//! `Database` on the same file; SQLite's single-writer locking, bounded by the
//! configured busy timeout, serializes writers. Every multi-step write runs in
//! an IMMEDIATE transaction so the write lock is taken before any read. There
//! is no cache in front of the store.

mod capsules;
mod schema;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::config::StoreConfig;
use crate::error::{CapsuleError, Result};
use crate::map_db_err;

pub use capsules::{ImportOutcome, StoreStats};
pub use schema::CURRENT_SCHEMA_VERSION;

/// SQLite-backed capsule store
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    config: StoreConfig,
}

impl Database {
    /// Open or create the database at `path`, creating parent directories
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| map_db_err!("open database", e))?;
        Self::from_connection(conn, config, true)
    }

    /// Open a private in-memory database (single connection only)
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| map_db_err!("open database", e))?;
        Self::from_connection(conn, config, false)
    }

    fn from_connection(conn: Connection, config: &StoreConfig, wal: bool) -> Result<Self> {
        // Before anything that may need a lock
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|e| map_db_err!("set busy timeout", e))?;

        if wal {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| map_db_err!("enable WAL mode", e))?;
        }

        schema::migrate(&conn)?;

        Ok(Database {
            conn,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn get_schema_version(&self) -> Result<i64> {
        schema::read_version(&self.conn)
    }

    /// Begin a transaction holding the write lock from the start
    fn write_tx(&self) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|e| map_db_err!("begin write transaction", e))
    }

    /// Begin a read transaction; all reads inside see one snapshot
    fn read_tx(&self) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)
            .map_err(|e| map_db_err!("begin read transaction", e))
    }
}

fn commit(tx: Transaction<'_>) -> Result<()> {
    tx.commit().map_err(|e| CapsuleError::internal("commit transaction", e))
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best effort; another connection may hold the lock
        let _ = self.conn.pragma_update(None, "wal_checkpoint", "PASSIVE");
    }
}

#[cfg(test)]
mod tests;
