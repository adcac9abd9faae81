//! Consumer-facing tile cache.
//!
//! [`BoundedCache`] is a fixed-capacity, recency-ordered map from tile id to
//! decoded image. Lookups never block on I/O: a miss returns the placeholder
//! immediately, records a pending entry and forwards one fetch request to the
//! pipeline. When the pipeline delivers the tile, the pending entry is
//! resolved and an "updates available" flag is raised for the renderer.
//!
//! # Seams
//!
//! - [`FetchRequester`] - where misses are sent (the coordinator)
//! - [`TileSink`] - how results come back (implemented by the cache)

mod bounded;
mod stats;

pub use bounded::BoundedCache;
pub use stats::CacheStats;

use tracing::warn;

use crate::coord::TileId;
use crate::raster::{decode_tile, TileImage};

/// Receives fetch requests for tiles the cache does not hold.
pub trait FetchRequester: Send + Sync {
    /// Asks for `id` to be loaded. Must not block.
    fn request_fetch(&self, id: TileId);
}

/// Receives asynchronously resolved tiles.
pub trait TileSink: Send + Sync {
    /// True if the sink still tracks `id`.
    ///
    /// Used to skip decoding results that would be dropped anyway.
    fn is_tracked(&self, id: TileId) -> bool;

    /// Resolves `id` with a decoded image, or with the placeholder when
    /// `image` is `None`. No-op if `id` is no longer tracked.
    fn deliver(&self, id: TileId, image: Option<TileImage>);

    /// Decodes raw tile bytes and delivers the result.
    ///
    /// Empty or undecodable data is delivered as the placeholder. Decoding
    /// happens on the caller's thread, outside any sink lock.
    fn deliver_bytes(&self, id: TileId, data: &[u8]) {
        if !self.is_tracked(id) {
            return;
        }

        if data.is_empty() {
            self.deliver(id, None);
            return;
        }

        match decode_tile(data) {
            Ok(image) => self.deliver(id, Some(image)),
            Err(e) => {
                warn!(x = id.x, y = id.y, zoom = id.zoom, error = %e, "Failed to decode tile");
                self.deliver(id, None);
            }
        }
    }
}
