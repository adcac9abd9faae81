//! Top-level error type for starting the tile cache.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;
use crate::store::StoreError;

/// Errors returned by [`TileCache`](crate::TileCache) startup.
///
/// Once running, the cache never surfaces errors to its consumer: failures
/// are logged and the affected tiles keep showing the placeholder.
#[derive(Debug, Error)]
pub enum TileCacheError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("tile store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("tile provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: io::Error,
    },
}

impl TileCacheError {
    pub(crate) fn spawn(thread: impl Into<String>, source: io::Error) -> Self {
        TileCacheError::Spawn {
            thread: thread.into(),
            source,
        }
    }
}
