//! SQLite-backed record store.
//!
//! `PerfDb` owns the one connection to `performance.db` and every mutation of
//! it. Each mutating call runs inside a transaction, recomputes the growth
//! figures its write may have shifted, and then refreshes the auto-backup
//! snapshot before returning. Nothing is deferred.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::types::Config;

pub mod names;
pub mod records;
pub mod summaries;
pub mod types;
pub use types::*;

/// Owner of the database connection.
///
/// This is intentionally NOT `Clone` or `Sync`: the store has a single
/// writer, and collaborators borrow it.
pub struct PerfDb {
    conn: Connection,
    auto_backup: Option<PathBuf>,
}

impl PerfDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the configured database, with auto-backup as configured.
    pub fn open(config: &Config) -> Result<Self, DbError> {
        let mut db = Self::open_at(config.db_path()?)?;
        db.auto_backup = config.auto_backup_path()?;
        Ok(db)
    }

    /// Open a database at an explicit path, with auto-backup disabled.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        let db = Self {
            conn,
            auto_backup: None,
        };

        // Databases written by older builds may hold names the registry never saw.
        db.sync_names_from_records()?;

        Ok(db)
    }

    /// Enable (or disable with `None`) the snapshot written after each mutation.
    pub fn set_auto_backup(&mut self, path: Option<PathBuf>) {
        self.auto_backup = path;
    }

    pub fn auto_backup_path(&self) -> Option<&Path> {
        self.auto_backup.as_deref()
    }

    /// Refresh the auto-backup snapshot. A failed write is logged, never
    /// surfaced: the mutation that triggered it has already committed.
    pub(crate) fn auto_backup(&self) {
        let Some(path) = &self.auto_backup else {
            return;
        };
        if let Err(e) = crate::db_backup::export_snapshot(self, path) {
            log::warn!("Auto-backup to {} failed: {e}", path.display());
        }
    }
}
