//! The consumer-facing tile cache service.
//!
//! [`TileCache`] wires the bounded cache, the coordinator and the fetch
//! workers together and owns their lifetimes.
//!
//! # Startup Sequence
//!
//! 1. Validate configuration
//! 2. Open the persistent store (or fall back per [`StoreFailurePolicy`])
//! 3. Create the coordinator inbox and the cache that feeds it
//! 4. Spawn the fetch workers
//! 5. Spawn the coordinator thread, which takes ownership of the store
//!
//! # Example
//!
//! ```ignore
//! use tilecache::{TileCache, TileCacheConfig, TileId};
//!
//! let mut cache = TileCache::start(TileCacheConfig::default())?;
//!
//! // Placeholders until the tiles arrive
//! let tiles = cache.get(&[TileId::new(3, 5, 10), TileId::new(4, 5, 10)]);
//!
//! if cache.has_updates() {
//!     // redraw
//! }
//!
//! cache.shutdown();
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::cache::{BoundedCache, CacheStats};
use crate::config::{StoreConfig, StoreFailurePolicy, TileCacheConfig};
use crate::coord::TileId;
use crate::error::TileCacheError;
use crate::pipeline::{Coordinator, CoordinatorHandle, FetchWorker, PipelineStats, WorkerHandle};
use crate::provider::{ReqwestClient, TileSource, UrlTemplateSource};
use crate::raster::TileImage;
use crate::store::{MemoryTileStore, SqliteTileStore, TileStore};

/// A running tile cache.
///
/// All methods take `&self` except [`shutdown`](Self::shutdown); the cache
/// is safe to share between threads behind an `Arc` if needed.
pub struct TileCache {
    cache: Arc<BoundedCache>,
    coordinator: CoordinatorHandle,
    coordinator_thread: Option<JoinHandle<()>>,
    workers: Vec<WorkerHandle>,
}

impl TileCache {
    /// Starts the cache with an HTTP source built from `config.fetch` and a
    /// SQLite store at `config.store.path`.
    pub fn start(config: TileCacheConfig) -> Result<Self, TileCacheError> {
        config.validate()?;
        let client =
            ReqwestClient::with_config(config.fetch.timeout_secs, config.fetch.proxy.as_deref())?;
        let source = UrlTemplateSource::new(client, config.fetch.url_template.clone());
        Self::with_source(config, Arc::new(source))
    }

    /// Starts the cache with a custom tile source and the configured store.
    pub fn with_source(
        config: TileCacheConfig,
        source: Arc<dyn TileSource>,
    ) -> Result<Self, TileCacheError> {
        config.validate()?;
        let store = open_store(&config.store)?;
        Self::with_parts(config, source, store)
    }

    /// Starts the cache with a custom source and an already opened store.
    pub fn with_parts(
        config: TileCacheConfig,
        source: Arc<dyn TileSource>,
        store: Box<dyn TileStore>,
    ) -> Result<Self, TileCacheError> {
        config.validate()?;

        let coordinator = CoordinatorHandle::new();
        let cache = Arc::new(BoundedCache::new(
            config.max_size,
            Arc::new(coordinator.clone()),
        ));

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            match FetchWorker::spawn(index, Arc::clone(&source), coordinator.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    workers.iter().for_each(WorkerHandle::stop);
                    return Err(TileCacheError::spawn(format!("tile-worker-{}", index), e));
                }
            }
        }

        let coordinator_thread = Coordinator::new(
            coordinator.clone(),
            store,
            cache.clone(),
            workers.clone(),
            config.store.persist_empty,
        )
        .spawn()
        .map_err(|e| {
            workers.iter().for_each(WorkerHandle::stop);
            TileCacheError::spawn("tile-coordinator", e)
        })?;

        info!(
            max_size = config.max_size,
            workers = config.worker_count,
            source = source.name(),
            "Tile cache started"
        );

        Ok(Self {
            cache,
            coordinator,
            coordinator_thread: Some(coordinator_thread),
            workers,
        })
    }

    /// Returns one image per id, in order. Never blocks on I/O.
    ///
    /// Missing tiles come back as the placeholder and are fetched in the
    /// background; see [`has_updates`](Self::has_updates).
    pub fn get(&self, ids: &[TileId]) -> Vec<TileImage> {
        self.cache.get(ids)
    }

    /// Single-tile form of [`get`](Self::get).
    pub fn get_one(&self, id: TileId) -> TileImage {
        self.cache.get_one(id)
    }

    /// True if any tile has been delivered since the previous call.
    pub fn has_updates(&self) -> bool {
        self.cache.poll_and_reset_dirty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.coordinator.stats()
    }

    /// Stops the coordinator and the workers.
    ///
    /// Waits for the coordinator to flush the store. Workers are told to
    /// stop but not joined; one blocked in a fetch finishes on its own and
    /// its result is discarded. Calling this again is a no-op.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.coordinator_thread.take() else {
            return;
        };

        self.coordinator.shutdown();
        if thread.join().is_err() {
            warn!("Tile coordinator thread panicked");
        }
        // The coordinator stops them too; this covers a coordinator that panicked.
        self.workers.iter().for_each(WorkerHandle::stop);

        info!(stats = %self.cache.stats(), "Tile cache stopped");
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Opens the configured SQLite store, applying the failure policy.
fn open_store(config: &StoreConfig) -> Result<Box<dyn TileStore>, TileCacheError> {
    match SqliteTileStore::open(&config.path, config.commit_batch) {
        Ok(store) => {
            info!(path = %config.path.display(), "Opened tile store");
            Ok(Box::new(store))
        }
        Err(e) => match config.on_failure {
            StoreFailurePolicy::Abort => Err(e.into()),
            StoreFailurePolicy::CacheOnly => {
                warn!(
                    path = %config.path.display(),
                    error = %e,
                    "Tile store unavailable, tiles will not persist across restarts"
                );
                Ok(Box::new(MemoryTileStore::new()))
            }
        },
    }
}
