//! Persistent tile storage.
//!
//! The store is the durable truth behind the in-memory cache: a write-once
//! mapping from `(x, y, zoom)` to raw tile bytes that survives restarts and
//! never evicts. It is owned by the coordinator thread and is never touched
//! from anywhere else, so implementations only need to be `Send`.
//!
//! Two implementations are provided:
//!
//! - [`SqliteTileStore`] - a single `tiles` table with a unique index on the
//!   key, committing in batches
//! - [`MemoryTileStore`] - volatile storage used when running cache-only

mod memory;
mod sqlite;

pub use memory::MemoryTileStore;
pub use sqlite::SqliteTileStore;

use std::path::PathBuf;

use thiserror::Error;

use crate::coord::TileId;

/// Errors raised by a tile store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported an error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to create the directory holding the database
    #[error("Failed to create store directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable key to blob mapping keyed by tile id.
pub trait TileStore: Send {
    /// Looks up the bytes stored for `id`.
    fn get(&self, id: TileId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `data` for `id` unless the key already exists.
    ///
    /// Returns `true` if a new record was written. Writes may be buffered
    /// until the next [`flush`](TileStore::flush).
    fn insert(&mut self, id: TileId, data: &[u8]) -> Result<bool, StoreError>;

    /// Commits buffered writes to durable storage.
    fn flush(&mut self) -> Result<(), StoreError>;
}
