//! Shared connection handle to the relational store.

use super::config::StoreConfig;
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// A single SQLite connection shared by concurrent callers.
///
/// Statements are serialized through an internal lock; wrap the store in an
/// `Arc` to hand it to several mappers.
pub struct Store {
    conn: Mutex<Connection>,
    config: StoreConfig,
}

impl Store {
    /// Open the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;

        info!(path = ?config.path, "opened store");
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// Open a fresh in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run one or more semicolon-separated statements, e.g. table definitions.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!(len = sql.len(), "executing batch");
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Check whether a table exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .lock()
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Run `f` with exclusive use of the connection.
    pub fn with_connection<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Close the underlying connection.
    pub fn close(self) -> Result<()> {
        self.conn.into_inner().close().map_err(|(_, err)| err)?;
        Ok(())
    }
}
