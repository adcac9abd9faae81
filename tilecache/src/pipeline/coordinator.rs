//! The coordinator: deduplicates requests and routes between store,
//! workers and cache.
//!
//! # Loop
//!
//! 1. Sleep on the condvar until a request or result arrives
//! 2. Drain both inboxes atomically, release the lock
//! 3. Results: persist successes, deliver resolved tiles, clear the
//!    in-flight mark (transient failures are only unmarked, never retried)
//! 4. Requests: skip ids already in flight; deliver store hits directly;
//!    dispatch store misses to the next worker, round-robin
//!
//! All store and decode work happens with no lock held.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::record::TileRecord;
use super::worker::WorkerHandle;
use crate::cache::{FetchRequester, TileSink};
use crate::coord::TileId;
use crate::raster::decode_tile;
use crate::store::TileStore;

/// Incoming work, guarded by the coordinator monitor.
#[derive(Default)]
struct Inbox {
    /// Requests in arrival order
    requests: Vec<TileId>,
    /// Same ids as `requests`, for O(1) duplicate checks
    queued: HashSet<TileId>,
    results: Vec<(TileId, TileRecord)>,
    shutdown: bool,
}

/// Counters updated by the coordinator loop.
#[derive(Default)]
struct PipelineCounters {
    store_hits: AtomicU64,
    dispatched: AtomicU64,
    deduplicated: AtomicU64,
    stored: AtomicU64,
    empty_results: AtomicU64,
    fetch_failures: AtomicU64,
    undecodable: AtomicU64,
}

struct Shared {
    inbox: Mutex<Inbox>,
    wakeup: Condvar,
    counters: PipelineCounters,
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Requests answered from the persistent store
    pub store_hits: u64,
    /// Requests handed to a fetch worker
    pub dispatched: u64,
    /// Requests skipped because a fetch for the id was already in flight
    pub deduplicated: u64,
    /// Records written to the persistent store
    pub stored: u64,
    /// Fetches that confirmed the tile does not exist
    pub empty_results: u64,
    /// Fetches that failed transiently
    pub fetch_failures: u64,
    /// Payloads discarded because they did not decode as an image
    pub undecodable: u64,
}

/// Cloneable handle to the coordinator's monitor.
///
/// This is the only way other threads talk to the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    shared: Arc<Shared>,
}

/// One drained set of work.
#[derive(Debug, Default)]
pub(crate) struct WorkBatch {
    pub(crate) requests: Vec<TileId>,
    pub(crate) results: Vec<(TileId, TileRecord)>,
    pub(crate) shutdown: bool,
}

impl CoordinatorHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inbox: Mutex::new(Inbox::default()),
                wakeup: Condvar::new(),
                counters: PipelineCounters::default(),
            }),
        }
    }

    /// Queues a fetch request for `id` and wakes the loop.
    ///
    /// Idempotent per id until the loop drains it. Ignored after shutdown.
    pub fn request_fetch(&self, id: TileId) {
        let mut inbox = self.shared.inbox.lock();
        if inbox.shutdown {
            return;
        }
        if inbox.queued.insert(id) {
            inbox.requests.push(id);
        }
        self.shared.wakeup.notify_one();
    }

    /// Queues a fetch outcome reported by a worker and wakes the loop.
    pub fn report_result(&self, id: TileId, record: TileRecord) {
        let mut inbox = self.shared.inbox.lock();
        if inbox.shutdown {
            return;
        }
        inbox.results.push((id, record));
        self.shared.wakeup.notify_one();
    }

    /// Asks the loop to finish its current iteration and exit.
    pub fn shutdown(&self) {
        let mut inbox = self.shared.inbox.lock();
        inbox.shutdown = true;
        self.shared.wakeup.notify_all();
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.shared.counters;
        PipelineStats {
            store_hits: c.store_hits.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            deduplicated: c.deduplicated.load(Ordering::Relaxed),
            stored: c.stored.load(Ordering::Relaxed),
            empty_results: c.empty_results.load(Ordering::Relaxed),
            fetch_failures: c.fetch_failures.load(Ordering::Relaxed),
            undecodable: c.undecodable.load(Ordering::Relaxed),
        }
    }

    /// Blocks until there is work (or shutdown), then drains both inboxes.
    pub(crate) fn wait_for_work(&self) -> WorkBatch {
        let mut inbox = self.shared.inbox.lock();
        while inbox.requests.is_empty() && inbox.results.is_empty() && !inbox.shutdown {
            self.shared.wakeup.wait(&mut inbox);
        }

        inbox.queued.clear();
        WorkBatch {
            requests: std::mem::take(&mut inbox.requests),
            results: std::mem::take(&mut inbox.results),
            shutdown: inbox.shutdown,
        }
    }

    fn counters(&self) -> &PipelineCounters {
        &self.shared.counters
    }
}

impl Default for CoordinatorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchRequester for CoordinatorHandle {
    fn request_fetch(&self, id: TileId) {
        CoordinatorHandle::request_fetch(self, id);
    }
}

/// The coordinator actor.
///
/// Owns the persistent store, the set of ids currently assigned to a worker,
/// and the round-robin cursor. Runs on a single dedicated thread.
pub struct Coordinator {
    handle: CoordinatorHandle,
    store: Box<dyn TileStore>,
    sink: Arc<dyn TileSink>,
    workers: Vec<WorkerHandle>,
    next_worker: usize,
    /// Dispatch-pending set: ids assigned to a worker and not yet reported
    in_flight: HashSet<TileId>,
    persist_empty: bool,
}

impl Coordinator {
    /// Creates a coordinator.
    ///
    /// When `persist_empty` is set, confirmed-empty results are written to
    /// the store as zero-length blobs and served from it afterwards.
    pub fn new(
        handle: CoordinatorHandle,
        store: Box<dyn TileStore>,
        sink: Arc<dyn TileSink>,
        workers: Vec<WorkerHandle>,
        persist_empty: bool,
    ) -> Self {
        Self {
            handle,
            store,
            sink,
            workers,
            next_worker: 0,
            in_flight: HashSet::new(),
            persist_empty,
        }
    }

    /// Runs the loop on a thread named `tile-coordinator`.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("tile-coordinator".to_string())
            .spawn(move || self.run())
    }

    /// Runs the loop on the current thread until shutdown.
    pub fn run(mut self) {
        info!(workers = self.workers.len(), "Tile coordinator started");

        loop {
            let batch = self.handle.wait_for_work();

            for (id, record) in batch.results {
                self.handle_result(id, record);
            }
            for id in batch.requests {
                self.handle_request(id);
            }

            if batch.shutdown {
                break;
            }
        }

        for worker in &self.workers {
            worker.stop();
        }
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "Failed to flush tile store on shutdown");
        }

        info!(
            abandoned = self.in_flight.len(),
            "Tile coordinator stopped"
        );
    }

    fn handle_result(&mut self, id: TileId, record: TileRecord) {
        self.in_flight.remove(&id);

        match record {
            // The store is write-once, so only payloads that decode are kept.
            TileRecord::Data(data) => match decode_tile(&data) {
                Ok(image) => {
                    self.persist(id, &data);
                    self.sink.deliver(id, Some(image));
                }
                Err(e) => {
                    self.handle.counters().undecodable.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        x = id.x, y = id.y, zoom = id.zoom, error = %e,
                        "Discarding undecodable tile"
                    );
                    self.sink.deliver(id, None);
                }
            },
            TileRecord::Empty => {
                self.handle.counters().empty_results.fetch_add(1, Ordering::Relaxed);
                if self.persist_empty {
                    self.persist(id, &[]);
                }
                self.sink.deliver(id, None);
            }
            TileRecord::Unavailable => {
                // No retry: the tile stays pending until evicted and re-requested.
                self.handle.counters().fetch_failures.fetch_add(1, Ordering::Relaxed);
                debug!(x = id.x, y = id.y, zoom = id.zoom, "Dropping failed fetch");
            }
        }
    }

    fn handle_request(&mut self, id: TileId) {
        if self.in_flight.contains(&id) {
            self.handle.counters().deduplicated.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match self.store.get(id) {
            Ok(Some(data)) => {
                self.handle.counters().store_hits.fetch_add(1, Ordering::Relaxed);
                self.sink.deliver_bytes(id, &data);
            }
            Ok(None) => self.dispatch(id),
            Err(e) => {
                warn!(x = id.x, y = id.y, zoom = id.zoom, error = %e, "Tile store lookup failed");
                self.dispatch(id);
            }
        }
    }

    fn dispatch(&mut self, id: TileId) {
        if self.workers.is_empty() {
            warn!(x = id.x, y = id.y, zoom = id.zoom, "No fetch workers, dropping request");
            return;
        }

        let worker = &self.workers[self.next_worker];
        self.next_worker = (self.next_worker + 1) % self.workers.len();

        self.in_flight.insert(id);
        worker.submit(id);
        self.handle.counters().dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(x = id.x, y = id.y, zoom = id.zoom, worker = worker.index(), "Dispatched tile");
    }

    fn persist(&mut self, id: TileId, data: &[u8]) {
        match self.store.insert(id, data) {
            Ok(true) => {
                self.handle.counters().stored.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(x = id.x, y = id.y, zoom = id.zoom, error = %e, "Failed to persist tile");
            }
        }
    }
}
