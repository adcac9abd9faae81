//! SQLite-backed tile store.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS tiles (x INTEGER, y INTEGER, zoom INTEGER, data BLOB);
//! CREATE UNIQUE INDEX IF NOT EXISTS tiles_index ON tiles (x, y, zoom);
//! ```
//!
//! Both statements are idempotent, so opening an existing database leaves
//! schema and data untouched.
//!
//! # Batched Commits
//!
//! Inserts run inside an open transaction that is committed after every
//! `commit_batch` writes and on [`flush`](TileStore::flush). A crash loses
//! at most one batch; reads on the same connection see uncommitted rows.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{StoreError, TileStore};
use crate::coord::TileId;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS tiles (
    x INTEGER,
    y INTEGER,
    zoom INTEGER,
    data BLOB)";

const CREATE_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS tiles_index ON tiles (x, y, zoom)";

/// Durable [`TileStore`] on a single SQLite connection.
pub struct SqliteTileStore {
    conn: Connection,
    commit_batch: usize,
    uncommitted: usize,
}

impl SqliteTileStore {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>, commit_batch: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn, commit_batch)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(commit_batch: usize) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, commit_batch)
    }

    fn with_connection(conn: Connection, commit_batch: usize) -> Result<Self, StoreError> {
        let store = Self {
            conn,
            commit_batch: commit_batch.max(1),
            uncommitted: 0,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates the table and its unique index if they do not exist.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute(CREATE_TABLE, [])?;
        self.conn.execute(CREATE_INDEX, [])?;
        Ok(())
    }

    /// Number of stored records, including uncommitted ones.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Number of writes not yet committed.
    pub fn uncommitted(&self) -> usize {
        self.uncommitted
    }
}

impl TileStore for SqliteTileStore {
    fn get(&self, id: TileId) -> Result<Option<Vec<u8>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data FROM tiles WHERE x = ?1 AND y = ?2 AND zoom = ?3")?;
        let data = stmt
            .query_row(params![id.x, id.y, id.zoom], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(data)
    }

    fn insert(&mut self, id: TileId, data: &[u8]) -> Result<bool, StoreError> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let changed = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO tiles (x, y, zoom, data) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![id.x, id.y, id.zoom, data])?;

        if changed > 0 {
            self.uncommitted += 1;
            if self.uncommitted >= self.commit_batch {
                self.flush()?;
            }
        }

        Ok(changed > 0)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
            debug!(records = self.uncommitted, "Committed tile store batch");
        }
        self.uncommitted = 0;
        Ok(())
    }
}

impl Drop for SqliteTileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to commit tile store on close");
        }
    }
}
