//! Concurrent job spooler
//!
//! This module implements the job dispatch core: a bounded FIFO shared by
//! all producers and a fixed pool of worker threads, each bound to its own
//! storage backend.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │        Spooler          │
//!                     │  - submit / end_of_txn  │
//!                     │  - counters + callback  │
//!                     └───────────┬─────────────┘
//!                                 │ put
//!                     ┌───────────▼─────────────┐
//!                     │        JobQueue         │
//!                     │  bounded FIFO, blocking │
//!                     └───────────┬─────────────┘
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │ get                     │ get                     │ get
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  backend  │             │  backend  │             │  backend  │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └──────────── job_finished ─▶ callback ◀────────────┘
//! ```

pub mod coordinator;
pub mod job;
pub mod queue;
pub mod worker;

pub use coordinator::{Spooler, SpoolerCallback, SpoolerResult, SpoolerState, SpoolerStats};
pub use job::{Job, JobKind, JobResult, TransferJob, TransformJob};
pub use queue::{JobQueue, QueueStats, QueueStatsSnapshot};
pub use worker::{Worker, WorkerStats};
