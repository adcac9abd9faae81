//! Configuration for the tile cache.
//!
//! Every component receives its settings through [`TileCacheConfig`] at
//! construction time; there is no global configuration state.
//!
//! Settings can be built in code with the `with_*` setters or loaded from an
//! INI file with [`TileCacheConfig::load_from`]:
//!
//! ```ini
//! [cache]
//! max_size = 20
//! worker_count = 2
//!
//! [store]
//! path = /var/lib/tilecache/tiles.db
//! commit_batch = 40
//! persist_empty = false
//! on_failure = abort
//!
//! [fetch]
//! url_template = http://mt.google.com/mt?x={x}&y={y}&zoom={zoom}
//! timeout = 30
//! proxy = http://proxy.example.com:8083/
//! ```

mod file;

pub use file::ConfigError;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::provider::DEFAULT_URL_TEMPLATE;

/// Default number of entries held by the in-memory cache.
pub const DEFAULT_MAX_SIZE: usize = 20;

/// Default number of fetch worker threads.
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Default number of store inserts between commits.
pub const DEFAULT_COMMIT_BATCH: usize = 40;

/// Default HTTP timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// What to do when the persistent store cannot be opened at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailurePolicy {
    /// Fail startup with the store error
    #[default]
    Abort,
    /// Log a warning and run with a volatile in-memory store
    CacheOnly,
}

impl FromStr for StoreFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(StoreFailurePolicy::Abort),
            "cache-only" | "cache_only" => Ok(StoreFailurePolicy::CacheOnly),
            other => Err(format!(
                "unknown policy '{}', expected 'abort' or 'cache-only'",
                other
            )),
        }
    }
}

impl fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFailurePolicy::Abort => write!(f, "abort"),
            StoreFailurePolicy::CacheOnly => write!(f, "cache-only"),
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Inserts between commits
    pub commit_batch: usize,
    /// Also store confirmed-empty results, so they are not fetched again
    pub persist_empty: bool,
    /// Behaviour when the store cannot be opened
    pub on_failure: StoreFailurePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            commit_batch: DEFAULT_COMMIT_BATCH,
            persist_empty: false,
            on_failure: StoreFailurePolicy::default(),
        }
    }
}

/// Network fetch settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// URL template with `{x}`, `{y}`, `{zoom}` and optional `{s}`
    pub url_template: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Proxy URL applied to all requests
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            proxy: None,
        }
    }
}

/// Top-level configuration passed to [`TileCache::start`](crate::TileCache::start).
#[derive(Debug, Clone, PartialEq)]
pub struct TileCacheConfig {
    /// Maximum entries in the in-memory cache
    pub max_size: usize,
    /// Number of fetch worker threads
    pub worker_count: usize,
    pub store: StoreConfig,
    pub fetch: FetchConfig,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
            store: StoreConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl TileCacheConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    pub fn with_commit_batch(mut self, commit_batch: usize) -> Self {
        self.store.commit_batch = commit_batch;
        self
    }

    pub fn with_persist_empty(mut self, persist_empty: bool) -> Self {
        self.store.persist_empty = persist_empty;
        self
    }

    pub fn with_store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.store.on_failure = policy;
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.fetch.url_template = template.into();
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch.timeout_secs = secs;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.fetch.proxy = Some(proxy.into());
        self
    }

    /// Checks that every count is at least one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("cache", "max_size", self.max_size)?;
        require_positive("cache", "worker_count", self.worker_count)?;
        require_positive("store", "commit_batch", self.store.commit_batch)?;
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::invalid("fetch", "timeout", "0", "must be at least 1"));
        }
        Ok(())
    }
}

fn require_positive(section: &str, key: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(section, key, "0", "must be at least 1"));
    }
    Ok(())
}

/// Default database location (`<data dir>/tilecache/tiles.db`).
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilecache")
        .join("tiles.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TileCacheConfig::default();
        assert_eq!(config.max_size, 20);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.store.commit_batch, 40);
        assert!(!config.store.persist_empty);
        assert_eq!(config.store.on_failure, StoreFailurePolicy::Abort);
        assert_eq!(config.fetch.url_template, DEFAULT_URL_TEMPLATE);
        assert_eq!(config.fetch.proxy, None);
        assert!(config.store.path.ends_with("tilecache/tiles.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TileCacheConfig::default()
            .with_max_size(64)
            .with_worker_count(4)
            .with_store_path("/tmp/t.db")
            .with_commit_batch(10)
            .with_persist_empty(true)
            .with_store_failure_policy(StoreFailurePolicy::CacheOnly)
            .with_url_template("http://x/{zoom}/{x}/{y}")
            .with_fetch_timeout_secs(5)
            .with_proxy("http://proxy:8083/");

        assert_eq!(config.max_size, 64);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.store.path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.store.commit_batch, 10);
        assert!(config.store.persist_empty);
        assert_eq!(config.store.on_failure, StoreFailurePolicy::CacheOnly);
        assert_eq!(config.fetch.url_template, "http://x/{zoom}/{x}/{y}");
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.proxy.as_deref(), Some("http://proxy:8083/"));
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        assert!(TileCacheConfig::default().with_max_size(0).validate().is_err());
        assert!(TileCacheConfig::default()
            .with_worker_count(0)
            .validate()
            .is_err());
        assert!(TileCacheConfig::default()
            .with_commit_batch(0)
            .validate()
            .is_err());
        assert!(TileCacheConfig::default()
            .with_fetch_timeout_secs(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("abort".parse(), Ok(StoreFailurePolicy::Abort));
        assert_eq!(" Cache-Only ".parse(), Ok(StoreFailurePolicy::CacheOnly));
        assert_eq!("cache_only".parse(), Ok(StoreFailurePolicy::CacheOnly));
        assert!("sometimes".parse::<StoreFailurePolicy>().is_err());
        assert_eq!(StoreFailurePolicy::CacheOnly.to_string(), "cache-only");
    }
}
