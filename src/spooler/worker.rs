//! Worker thread logic for the spooler
//!
//! Each worker:
//! - Owns one storage backend instance
//! - Pulls jobs from the shared queue
//! - Executes transfer/transform jobs through its backend; a panic there
//!   fails the job with return code -1 instead of killing the thread
//! - Reports every job, termination included, to the spooler
//! - Exits after handing back its termination job

use crate::backend::PushBackend;
use crate::error::WorkerError;
use crate::spooler::coordinator::SpoolerShared;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, trace, warn};

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Jobs executed against the backend
    pub jobs_executed: AtomicU64,

    /// Jobs the backend reported as failed
    pub jobs_failed: AtomicU64,
}

impl WorkerStats {
    fn record(&self, success: bool) {
        self.jobs_executed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Jobs executed so far
    pub fn executed(&self) -> u64 {
        self.jobs_executed.load(Ordering::Relaxed)
    }

    /// Failed jobs so far
    pub fn failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }
}

/// A worker thread that executes spooler jobs
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub(crate) fn spawn(
        id: usize,
        shared: Arc<SpoolerShared>,
        backend: Box<dyn PushBackend>,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("spooler-{}", id))
            .spawn(move || worker_loop(id, shared, backend, stats_clone))
            .map_err(|e| WorkerError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    shared: Arc<SpoolerShared>,
    mut backend: Box<dyn PushBackend>,
    stats: Arc<WorkerStats>,
) {
    info!(worker = id, backend = backend.name(), "Worker starting");

    loop {
        let mut job = shared.queue().get();
        trace!(worker = id, job = %job.name(), "Acquired job");

        let terminate = job.is_termination();
        if !terminate {
            let success = match panic::catch_unwind(AssertUnwindSafe(|| backend.execute(&mut job))) {
                Ok(success) => success,
                Err(payload) => {
                    warn!(
                        worker = id,
                        job = %job.name(),
                        panic = %panic_message(payload.as_ref()),
                        "Backend panicked, job marked as failed"
                    );
                    job.fail_unfinished(-1);
                    false
                }
            };
            stats.record(success);
        }

        shared.job_finished(job);

        if terminate {
            break;
        }
    }

    info!(
        worker = id,
        executed = stats.executed(),
        failed = stats.failed(),
        "Worker shutting down"
    );
}

/// Aggregate (executed, failed) counts from multiple workers
pub fn aggregate_stats(workers: &[Worker]) -> (u64, u64) {
    workers.iter().fold((0, 0), |(executed, failed), worker| {
        (executed + worker.stats.executed(), failed + worker.stats.failed())
    })
}
