//! Fetch workers.
//!
//! Each worker owns a stack of pending tile ids and a dedicated thread that
//! performs one blocking fetch at a time. The stack is served newest first so
//! the tiles the user looked at most recently arrive first; under sustained
//! traffic older requests can starve.
//!
//! Workers are detached: nothing joins them. On shutdown they are told to
//! stop and exit after their current fetch, abandoning queued ids.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::coordinator::CoordinatorHandle;
use super::record::TileRecord;
use crate::coord::TileId;
use crate::provider::{ProviderError, TileSource};

struct WorkerQueue {
    /// Served last-in, first-out
    stack: Vec<TileId>,
    stopped: bool,
}

struct WorkerShared {
    queue: Mutex<WorkerQueue>,
    available: Condvar,
}

/// Handle used by the coordinator to feed a worker.
#[derive(Clone)]
pub struct WorkerHandle {
    index: usize,
    shared: Arc<WorkerShared>,
}

impl WorkerHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            shared: Arc::new(WorkerShared {
                queue: Mutex::new(WorkerQueue {
                    stack: Vec::new(),
                    stopped: false,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Worker number, used in thread names and logs.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pushes a request and wakes the worker if idle.
    pub fn submit(&self, id: TileId) {
        let mut queue = self.shared.queue.lock();
        if queue.stopped {
            return;
        }
        queue.stack.push(id);
        self.shared.available.notify_one();
    }

    /// Tells the worker to exit once its current fetch completes.
    pub fn stop(&self) {
        let mut queue = self.shared.queue.lock();
        queue.stopped = true;
        queue.stack.clear();
        self.shared.available.notify_all();
    }

    /// Number of queued, not yet started requests.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().stack.len()
    }

    /// Blocks until there is a request; `None` once stopped.
    pub(crate) fn next_request(&self) -> Option<TileId> {
        let mut queue = self.shared.queue.lock();
        loop {
            if queue.stopped {
                return None;
            }
            if let Some(id) = queue.stack.pop() {
                return Some(id);
            }
            self.shared.available.wait(&mut queue);
        }
    }
}

/// A fetch worker thread: pops ids, fetches them, reports the outcome.
pub struct FetchWorker {
    handle: WorkerHandle,
    source: Arc<dyn TileSource>,
    coordinator: CoordinatorHandle,
}

impl FetchWorker {
    /// Spawns worker `index` on a new thread named `tile-worker-{index}`.
    pub fn spawn(
        index: usize,
        source: Arc<dyn TileSource>,
        coordinator: CoordinatorHandle,
    ) -> io::Result<WorkerHandle> {
        let handle = WorkerHandle::new(index);
        let worker = FetchWorker {
            handle: handle.clone(),
            source,
            coordinator,
        };

        thread::Builder::new()
            .name(format!("tile-worker-{}", index))
            .spawn(move || worker.run())?;

        Ok(handle)
    }

    fn run(self) {
        let index = self.handle.index;
        debug!(worker = index, source = self.source.name(), "Fetch worker started");

        while let Some(id) = self.handle.next_request() {
            let record = fetch_record(self.source.as_ref(), id, index);
            self.coordinator.report_result(id, record);
        }

        debug!(worker = index, "Fetch worker stopped");
    }
}

/// Performs one fetch and maps it to a [`TileRecord`].
///
/// Errors and panics inside the source become `Unavailable`; they never
/// escape the worker.
fn fetch_record(source: &dyn TileSource, id: TileId, worker: usize) -> TileRecord {
    let result = panic::catch_unwind(AssertUnwindSafe(|| source.fetch(id)))
        .unwrap_or_else(|payload| Err(ProviderError::Panicked(panic_message(payload.as_ref()))));

    if let Err(e) = &result {
        warn!(worker, x = id.x, y = id.y, zoom = id.zoom, error = %e, "Could not download tile");
    }

    TileRecord::from(result)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
