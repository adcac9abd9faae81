//! # tilecache
//!
//! A bounded, non-blocking cache of map tile images backed by a persistent
//! SQLite store and a pool of background fetch workers.
//!
//! A consumer asks for a batch of tiles with [`TileCache::get`] and always
//! gets one image per id immediately. Tiles not yet available are returned
//! as a shared placeholder and resolved in the background:
//!
//! 1. The cache marks the id pending and forwards it to the coordinator
//! 2. The coordinator serves it from the store, or dispatches it to a
//!    fetch worker if the store does not have it
//! 3. The result is persisted and delivered back into the cache, and
//!    [`TileCache::has_updates`] reports true until polled
//!
//! Tiles evicted from the cache before their result arrives are dropped
//! on delivery.

pub mod cache;
pub mod config;
pub mod coord;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod raster;
pub mod service;
pub mod store;

pub use cache::{BoundedCache, CacheStats};
pub use config::{StoreFailurePolicy, TileCacheConfig};
pub use coord::TileId;
pub use error::TileCacheError;
pub use pipeline::PipelineStats;
pub use provider::{TilePayload, TileSource};
pub use raster::TileImage;
pub use service::TileCache;
