//! Volatile tile store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{StoreError, TileStore};
use crate::coord::TileId;

/// In-memory [`TileStore`].
///
/// Used in cache-only mode when the durable store cannot be opened. Clones
/// share the same storage, which lets tests inspect what the coordinator
/// wrote.
#[derive(Clone, Default)]
pub struct MemoryTileStore {
    tiles: Arc<Mutex<HashMap<TileId, Vec<u8>>>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.tiles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.lock().is_empty()
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.tiles.lock().contains_key(&id)
    }
}

impl TileStore for MemoryTileStore {
    fn get(&self, id: TileId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tiles.lock().get(&id).cloned())
    }

    fn insert(&mut self, id: TileId, data: &[u8]) -> Result<bool, StoreError> {
        let mut tiles = self.tiles.lock();
        if tiles.contains_key(&id) {
            return Ok(false);
        }
        tiles.insert(id, data.to_vec());
        Ok(true)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
