//! Asynchronous fetch pipeline behind the cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ request_fetch ┌─────────────────────┐  submit   ┌───────────────┐
//! │ BoundedCache │──────────────►│     Coordinator     │──────────►│ FetchWorker 0 │
//! │              │               │  (single thread)    │ round-    ├───────────────┤
//! │              │◄──────────────│  - in-flight set    │  robin    │ FetchWorker N │
//! └──────────────┘    deliver    │  - owns TileStore   │◄──────────└───────────────┘
//!                                └─────────────────────┘ report_result
//! ```
//!
//! Each actor owns its state behind its own monitor (mutex + condvar) and
//! blocks only on that condvar while idle. Only fetch workers perform network
//! I/O; only the coordinator touches the store.

mod coordinator;
mod record;
mod worker;

pub use coordinator::{Coordinator, CoordinatorHandle, PipelineStats};
pub use record::TileRecord;
pub use worker::{FetchWorker, WorkerHandle};
