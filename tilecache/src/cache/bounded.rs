//! Fixed-capacity LRU tile cache.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{CacheStats, FetchRequester, TileSink};
use crate::coord::TileId;
use crate::raster::TileImage;

/// State of one cache entry.
#[derive(Debug, Clone)]
enum CacheSlot {
    /// A fetch has been requested and has not resolved yet
    Pending,
    /// Resolved image (possibly the placeholder for a missing tile)
    Ready(TileImage),
}

/// Everything behind the cache lock.
struct CacheState {
    entries: LruCache<TileId, CacheSlot>,
    /// Deliveries since the last poll
    dirty: u64,
    stats: CacheStats,
}

/// Bounded, recency-ordered cache of decoded tiles.
///
/// All mutable state sits behind one mutex. [`get`](Self::get) and
/// [`deliver`](TileSink::deliver) hold it only for their map updates; fetch
/// requests are forwarded and images decoded after it is released.
pub struct BoundedCache {
    state: Mutex<CacheState>,
    requester: Arc<dyn FetchRequester>,
    capacity: usize,
}

impl BoundedCache {
    /// Creates a cache holding at most `max_size` entries (minimum 1).
    ///
    /// Misses are forwarded to `requester`.
    pub fn new(max_size: usize, requester: Arc<dyn FetchRequester>) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                dirty: 0,
                stats: CacheStats {
                    capacity: capacity.get(),
                    ..Default::default()
                },
            }),
            requester,
            capacity: capacity.get(),
        }
    }

    /// Returns the best available image for each id, in order.
    ///
    /// Never blocks on I/O. Out-of-range ids get the placeholder with no side
    /// effects. Resolved entries are returned and marked most recently used.
    /// Pending entries get the placeholder. Unknown ids get the placeholder,
    /// a pending entry (evicting the least recently used entry if the cache
    /// is full) and exactly one fetch request.
    pub fn get(&self, ids: &[TileId]) -> Vec<TileImage> {
        let placeholder = TileImage::placeholder();
        let mut images = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            for &id in ids {
                if !id.is_valid() {
                    state.stats.placeholders_served += 1;
                    images.push(placeholder.clone());
                    continue;
                }

                let found = state.entries.get(&id).cloned();
                match found {
                    Some(CacheSlot::Ready(image)) => {
                        state.stats.hits += 1;
                        images.push(image);
                    }
                    Some(CacheSlot::Pending) => {
                        state.stats.placeholders_served += 1;
                        images.push(placeholder.clone());
                    }
                    None => {
                        if let Some((evicted, _)) = state.entries.push(id, CacheSlot::Pending) {
                            trace!(x = evicted.x, y = evicted.y, zoom = evicted.zoom, "Evicted tile");
                            state.stats.evictions += 1;
                        }
                        state.stats.misses += 1;
                        state.stats.placeholders_served += 1;
                        images.push(placeholder.clone());
                        misses.push(id);
                    }
                }
            }
        }

        for id in misses {
            self.requester.request_fetch(id);
        }

        images
    }

    /// Single-id convenience for [`get`](Self::get).
    pub fn get_one(&self, id: TileId) -> TileImage {
        self.get(std::slice::from_ref(&id))
            .pop()
            .unwrap_or_else(TileImage::placeholder)
    }

    /// Returns whether any delivery happened since the last call, and resets
    /// the flag.
    pub fn poll_and_reset_dirty(&self) -> bool {
        let mut state = self.state.lock();
        let dirty = state.dirty > 0;
        state.dirty = 0;
        dirty
    }

    /// Current number of entries (pending and resolved).
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if `id` has an entry, pending or resolved. Does not touch recency.
    pub fn contains(&self, id: TileId) -> bool {
        self.state.lock().entries.contains(&id)
    }

    /// True if `id` has an entry that is still waiting for its fetch.
    pub fn is_pending(&self, id: TileId) -> bool {
        matches!(self.state.lock().entries.peek(&id), Some(CacheSlot::Pending))
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }
}

impl TileSink for BoundedCache {
    fn is_tracked(&self, id: TileId) -> bool {
        self.contains(id)
    }

    fn deliver(&self, id: TileId, image: Option<TileImage>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // Delivery must not reorder recency, so peek rather than get.
        match state.entries.peek_mut(&id) {
            Some(slot) => {
                *slot = CacheSlot::Ready(image.unwrap_or_else(TileImage::placeholder));
                state.dirty += 1;
                state.stats.deliveries += 1;
            }
            None => {
                debug!(x = id.x, y = id.y, zoom = id.zoom, "Dropping result for evicted tile");
                state.stats.obsolete_deliveries += 1;
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct CountingRequester(Mutex<usize>);

    impl FetchRequester for CountingRequester {
        fn request_fetch(&self, _id: TileId) {
            *self.0.lock() += 1;
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Get(Vec<i32>),
        Deliver(i32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec(0..12i32, 0..6).prop_map(Op::Get),
            (0..12i32).prop_map(Op::Deliver),
        ]
    }

    proptest! {
        /// The cache never holds more than its capacity and always answers
        /// one image per requested id.
        #[test]
        fn entries_never_exceed_capacity(
            capacity in 1usize..6,
            ops in prop::collection::vec(op(), 0..60),
        ) {
            let requester = Arc::new(CountingRequester(Mutex::new(0)));
            let cache = BoundedCache::new(capacity, requester);

            for op in ops {
                match op {
                    Op::Get(xs) => {
                        let ids: Vec<TileId> = xs.iter().map(|&x| TileId::new(x, 0, 10)).collect();
                        prop_assert_eq!(cache.get(&ids).len(), ids.len());
                    }
                    Op::Deliver(x) => cache.deliver(TileId::new(x, 0, 10), None),
                }
                prop_assert!(cache.len() <= capacity);
            }
        }

        /// Re-reading a batch that fits in the cache forwards no new requests.
        #[test]
        fn repeated_get_requests_nothing_new(
            xs in prop::collection::hash_set(0..50i32, 1..8),
        ) {
            let requester = Arc::new(CountingRequester(Mutex::new(0)));
            let cache = BoundedCache::new(8, requester.clone());
            let ids: Vec<TileId> = xs.iter().map(|&x| TileId::new(x, 0, 10)).collect();

            cache.get(&ids);
            let after_first = *requester.0.lock();
            prop_assert_eq!(after_first, ids.len());

            cache.get(&ids);
            prop_assert_eq!(*requester.0.lock(), after_first);
        }
    }
}
