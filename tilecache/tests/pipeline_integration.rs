//! Integration tests for the tile cache service.
//!
//! These tests run the real coordinator and worker threads against a
//! scripted tile source and verify:
//! - Placeholders first, real tiles after background delivery
//! - At most one fetch per tile while it is pending
//! - Results for evicted tiles are persisted but not cached
//! - Persistence across restarts with a SQLite store
//! - Empty and failed fetches
//!
//! Run with: `cargo test --test pipeline_integration`

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tempfile::TempDir;

use tilecache::provider::ProviderError;
use tilecache::store::MemoryTileStore;
use tilecache::{TileCache, TileCacheConfig, TileId, TilePayload, TileSource};

// ============================================================================
// Helper Functions
// ============================================================================

const ZOOM: u8 = 10;

fn tile(x: i32, y: i32) -> TileId {
    TileId::new(x, y, ZOOM)
}

/// A small PNG whose colour encodes the tile position.
fn png_for(id: TileId) -> Vec<u8> {
    let img = RgbaImage::from_pixel(4, 4, Rgba([id.x as u8, id.y as u8, id.zoom, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Tile source with per-id fetch counters and scripted outcomes.
#[derive(Default)]
struct ScriptedSource {
    fetches: Mutex<HashMap<TileId, usize>>,
    missing: HashSet<TileId>,
    failing: HashSet<TileId>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    fn with_missing(ids: &[TileId]) -> Self {
        Self {
            missing: ids.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn with_failing(ids: &[TileId]) -> Self {
        Self {
            failing: ids.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn fetch_count(&self, id: TileId) -> usize {
        self.fetches.lock().get(&id).copied().unwrap_or(0)
    }

    fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

impl TileSource for ScriptedSource {
    fn fetch(&self, id: TileId) -> Result<TilePayload, ProviderError> {
        *self.fetches.lock().entry(id).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.failing.contains(&id) {
            return Err(ProviderError::HttpStatus(503));
        }
        if self.missing.contains(&id) {
            return Ok(TilePayload::Missing);
        }
        Ok(TilePayload::Image(png_for(id)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn start_in_memory(config: TileCacheConfig, source: &Arc<ScriptedSource>) -> TileCache {
    TileCache::with_parts(config, source.clone(), Box::new(MemoryTileStore::new())).unwrap()
}

/// Polls `condition` until it holds or five seconds pass.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn all_resolved(cache: &TileCache, ids: &[TileId]) -> bool {
    cache.get(ids).iter().all(|image| !image.is_placeholder())
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_tiles_arrive_in_background() {
    let source = Arc::new(ScriptedSource::default());
    let cache = start_in_memory(TileCacheConfig::default(), &source);
    let ids = [tile(1, 2), tile(3, 4)];

    let first = cache.get(&ids);
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|image| image.is_placeholder()));

    assert!(wait_until(|| all_resolved(&cache, &ids)));

    let images = cache.get(&ids);
    assert_eq!(images[0].pixels().get_pixel(0, 0), &Rgba([1, 2, ZOOM, 255]));
    assert_eq!(images[1].pixels().get_pixel(0, 0), &Rgba([3, 4, ZOOM, 255]));

    assert!(cache.has_updates());
    assert!(!cache.has_updates());

    let stats = cache.pipeline_stats();
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.stored, 2);
}

#[test]
fn test_results_preserve_request_order() {
    let source = Arc::new(ScriptedSource::default());
    let cache = start_in_memory(TileCacheConfig::default().with_max_size(10), &source);
    let ids: Vec<TileId> = (0..6).map(|x| tile(x, 7)).collect();

    assert!(wait_until(|| all_resolved(&cache, &ids)));

    for (id, image) in ids.iter().zip(cache.get(&ids)) {
        assert_eq!(image.pixels().get_pixel(0, 0)[0], id.x as u8);
    }
}

#[test]
fn test_pending_tile_fetched_once() {
    let source = Arc::new(ScriptedSource::slow(Duration::from_millis(50)));
    let cache = Arc::new(start_in_memory(TileCacheConfig::default(), &source));
    let id = tile(5, 5);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..20 {
                    cache.get(&[id, id]);
                }
            })
        })
        .collect();
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(wait_until(|| all_resolved(&cache, &[id])));
    assert_eq!(source.fetch_count(id), 1);
}

#[test]
fn test_evicted_tile_is_stored_but_not_cached() {
    let source = Arc::new(ScriptedSource::default());
    let mut cache = start_in_memory(TileCacheConfig::default().with_max_size(2), &source);
    let (a, b, c) = (tile(0, 0), tile(1, 0), tile(2, 0));

    // `a` is evicted by `c` within the same call.
    cache.get(&[a, b, c]);

    // `stored` is counted before delivery, so wait for both.
    assert!(wait_until(
        || cache.pipeline_stats().stored == 3 && all_resolved(&cache, &[b, c])
    ));
    assert_eq!(cache.stats().entries, 2);

    // Asking again is served from the store, not fetched.
    cache.get(&[a]);
    assert!(wait_until(|| all_resolved(&cache, &[a])));
    assert_eq!(source.fetch_count(a), 1);
    assert_eq!(cache.pipeline_stats().store_hits, 1);

    cache.shutdown();
}

#[test]
fn test_store_persists_across_restart() {
    let temp = TempDir::new().unwrap();
    let config = TileCacheConfig::default().with_store_path(temp.path().join("tiles.db"));
    let ids = [tile(8, 9), tile(9, 9)];

    let first_source = Arc::new(ScriptedSource::default());
    let mut first = TileCache::with_source(config.clone(), first_source.clone()).unwrap();
    first.get(&ids);
    assert!(wait_until(|| all_resolved(&first, &ids)));
    first.shutdown();

    let second_source = Arc::new(ScriptedSource::default());
    let second = TileCache::with_source(config, second_source.clone()).unwrap();
    second.get(&ids);
    assert!(wait_until(|| all_resolved(&second, &ids)));

    assert_eq!(second_source.total_fetches(), 0);
    assert_eq!(second.pipeline_stats().store_hits, 2);
    let images = second.get(&ids);
    assert_eq!(images[0].pixels().get_pixel(0, 0), &Rgba([8, 9, ZOOM, 255]));
}

#[test]
fn test_empty_tile_not_persisted_by_default() {
    let temp = TempDir::new().unwrap();
    let config = TileCacheConfig::default().with_store_path(temp.path().join("tiles.db"));
    let id = tile(4, 4);

    let source = Arc::new(ScriptedSource::with_missing(&[id]));
    let mut first = TileCache::with_source(config.clone(), source.clone()).unwrap();
    first.get(&[id]);
    assert!(wait_until(|| first.pipeline_stats().empty_results == 1));
    // Resolved to the placeholder, and the consumer is told.
    assert!(wait_until(|| first.stats().deliveries == 1));
    assert!(first.has_updates());
    assert!(first.get_one(id).is_placeholder());
    first.shutdown();

    let second = TileCache::with_source(config, source.clone()).unwrap();
    second.get(&[id]);
    assert!(wait_until(|| source.fetch_count(id) == 2));
}

#[test]
fn test_empty_tile_persisted_when_enabled() {
    let temp = TempDir::new().unwrap();
    let config = TileCacheConfig::default()
        .with_store_path(temp.path().join("tiles.db"))
        .with_persist_empty(true);
    let id = tile(4, 4);

    let source = Arc::new(ScriptedSource::with_missing(&[id]));
    let mut first = TileCache::with_source(config.clone(), source.clone()).unwrap();
    first.get(&[id]);
    assert!(wait_until(|| first.pipeline_stats().stored == 1));
    first.shutdown();

    let second = TileCache::with_source(config, source.clone()).unwrap();
    second.get(&[id]);
    assert!(wait_until(|| second.pipeline_stats().store_hits == 1));
    assert_eq!(source.fetch_count(id), 1);
}

#[test]
fn test_failed_fetch_leaves_tile_pending() {
    let id = tile(6, 6);
    let source = Arc::new(ScriptedSource::with_failing(&[id]));
    let cache = start_in_memory(TileCacheConfig::default(), &source);

    cache.get(&[id]);
    assert!(wait_until(|| cache.pipeline_stats().fetch_failures == 1));

    // Still pending: served as placeholder and not requested again.
    for _ in 0..5 {
        assert!(cache.get_one(id).is_placeholder());
    }
    thread::sleep(Duration::from_millis(50));
    assert_eq!(source.fetch_count(id), 1);
    assert!(!cache.has_updates());
    assert_eq!(cache.pipeline_stats().stored, 0);
}

#[test]
fn test_invalid_ids_never_fetched() {
    let source = Arc::new(ScriptedSource::default());
    let cache = start_in_memory(TileCacheConfig::default(), &source);

    let images = cache.get(&[TileId::new(-1, 0, 3), TileId::new(0, 0, 16)]);
    assert!(images.iter().all(|image| image.is_placeholder()));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(source.total_fetches(), 0);
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn test_shutdown_is_idempotent() {
    let source = Arc::new(ScriptedSource::default());
    let mut cache = start_in_memory(TileCacheConfig::default(), &source);
    let id = tile(2, 2);

    cache.get(&[id]);
    assert!(wait_until(|| all_resolved(&cache, &[id])));

    cache.shutdown();
    cache.shutdown();

    // Cached tiles remain readable; new ids stay placeholders.
    assert!(!cache.get_one(id).is_placeholder());
    assert!(cache.get_one(tile(3, 3)).is_placeholder());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(source.fetch_count(tile(3, 3)), 0);
}

#[test]
fn test_rejects_invalid_config() {
    let source = Arc::new(ScriptedSource::default());
    let result = TileCache::with_parts(
        TileCacheConfig::default().with_worker_count(0),
        source,
        Box::new(MemoryTileStore::new()),
    );
    assert!(matches!(result, Err(tilecache::TileCacheError::Config(_))));
}
