//! Spooler - orchestrates the upload worker pool
//!
//! The spooler is responsible for:
//! - Building one backend per worker and spawning the worker threads
//! - Accepting transfer/transform submissions into the bounded queue
//! - Completion bookkeeping (pending/failed counters, callback dispatch)
//! - The shutdown protocol: one termination job per worker, queued behind
//!   all prior work, and a single teardown once the last one finished
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ─initialize─▶ Initialized ─submit─▶ TransactionOpen
//!                                  │                      │
//!                                  └──end_of_transaction──┴─▶ TransactionClosed
//!                                                                  │
//!                                          last termination job ───┴─▶ TornDown
//! ```
//!
//! Calling the API out of order (submitting after the transaction closed,
//! closing twice, registering a second callback) is a bug in the caller
//! and panics. State transitions are single compare-and-swap steps, so two
//! racing `end_of_transaction` calls close the transaction exactly once.
//!
//! A panic in a backend or in the completion callback fails that one job;
//! the worker keeps running and the drain/teardown bookkeeping still happens.

use crate::backend::{definition_factory, PushBackend};
use crate::config::SpoolerDefinition;
use crate::error::{BackendResult, Result, WorkerError};
use crate::spooler::job::{Job, TransferJob, TransformJob};
use crate::spooler::queue::{JobQueue, QueueStatsSnapshot};
use crate::spooler::worker::{aggregate_stats, panic_message, Worker};
use parking_lot::{Condvar, Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Payload handed to the completion callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolerResult<'a> {
    /// A transfer job finished
    Copied {
        local_path: &'a Path,
        return_code: i32,
    },

    /// A transform job finished
    Processed {
        local_path: &'a Path,
        return_code: i32,
        content_hash: &'a str,
    },
}

impl SpoolerResult<'_> {
    /// Source path of the finished job
    pub fn local_path(&self) -> &Path {
        match self {
            SpoolerResult::Copied { local_path, .. } => local_path,
            SpoolerResult::Processed { local_path, .. } => local_path,
        }
    }

    /// Return code of the finished job
    pub fn return_code(&self) -> i32 {
        match self {
            SpoolerResult::Copied { return_code, .. } => *return_code,
            SpoolerResult::Processed { return_code, .. } => *return_code,
        }
    }
}

/// Registered completion callback
pub type SpoolerCallback = Box<dyn Fn(&SpoolerResult<'_>) + Send + Sync>;

/// Lifecycle state of a spooler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpoolerState {
    Uninitialized = 0,
    Initialized = 1,
    TransactionOpen = 2,
    TransactionClosed = 3,
    TornDown = 4,
}

impl SpoolerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SpoolerState::Initialized,
            2 => SpoolerState::TransactionOpen,
            3 => SpoolerState::TransactionClosed,
            4 => SpoolerState::TornDown,
            _ => SpoolerState::Uninitialized,
        }
    }

    /// Whether new jobs may still be submitted
    pub fn accepts_jobs(&self) -> bool {
        matches!(self, SpoolerState::Initialized | SpoolerState::TransactionOpen)
    }
}

/// Snapshot of spooler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoolerStats {
    /// Jobs submitted but not yet finished (termination jobs included)
    pub jobs_pending: usize,

    /// Jobs that finished unsuccessfully
    pub jobs_failed: u64,

    /// Jobs executed against a backend
    pub jobs_executed: u64,

    /// Termination jobs processed so far
    pub terminations_executed: usize,

    /// Number of worker threads
    pub worker_count: usize,

    /// Lifecycle state
    pub state: SpoolerState,

    /// Queue counters
    pub queue: QueueStatsSnapshot,
}

/// State shared between the spooler handle and its workers
pub(crate) struct SpoolerShared {
    definition: SpoolerDefinition,
    queue: JobQueue,

    jobs_pending: AtomicUsize,
    jobs_failed: AtomicU64,
    terminations_executed: AtomicUsize,
    teardowns: AtomicUsize,

    state: AtomicU8,
    callback: RwLock<Option<SpoolerCallback>>,

    /// Paired with `all_done` so a drain waiter cannot miss the last decrement
    drain_lock: Mutex<()>,
    all_done: Condvar,
}

impl SpoolerShared {
    fn new(definition: SpoolerDefinition) -> Self {
        let queue = JobQueue::new(definition.max_pending_jobs);

        Self {
            definition,
            queue,
            jobs_pending: AtomicUsize::new(0),
            jobs_failed: AtomicU64::new(0),
            terminations_executed: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
            state: AtomicU8::new(SpoolerState::Uninitialized as u8),
            callback: RwLock::new(None),
            drain_lock: Mutex::new(()),
            all_done: Condvar::new(),
        }
    }

    pub(crate) fn queue(&self) -> &JobQueue {
        &self.queue
    }

    fn worker_count(&self) -> usize {
        self.definition.worker_count
    }

    fn state(&self) -> SpoolerState {
        SpoolerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SpoolerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move `Initialized` to `TransactionOpen`; an open transaction stays open
    fn open_transaction(&self) -> std::result::Result<(), SpoolerState> {
        match self.state.compare_exchange(
            SpoolerState::Initialized as u8,
            SpoolerState::TransactionOpen as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) if current == SpoolerState::TransactionOpen as u8 => Ok(()),
            Err(current) => Err(SpoolerState::from_u8(current)),
        }
    }

    /// Move a running spooler to `TransactionClosed`
    ///
    /// Exactly one caller wins; everyone else gets the state they saw.
    fn close_transaction(&self) -> std::result::Result<(), SpoolerState> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let state = SpoolerState::from_u8(current);
            if !state.accepts_jobs() {
                return Err(state);
            }
            match self.state.compare_exchange_weak(
                current,
                SpoolerState::TransactionClosed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn schedule_terminations(&self) {
        info!(
            workers = self.worker_count(),
            pending = self.jobs_pending.load(Ordering::Acquire),
            "Spooler received end of transaction"
        );

        for _ in 0..self.worker_count() {
            self.schedule(Job::Termination);
        }
    }

    /// Count the job as pending, then queue it (blocks while full)
    fn schedule(&self, job: Job) {
        trace!(job = %job.name(), "Scheduling job");
        self.jobs_pending.fetch_add(1, Ordering::AcqRel);
        self.queue.put(job);
    }

    /// Completion path, called on the worker thread that ran `job`
    pub(crate) fn job_finished(&self, job: Job) {
        if job.is_successful() {
            trace!(job = %job.name(), "Spooler job succeeded");
        } else {
            self.jobs_failed.fetch_add(1, Ordering::AcqRel);
            warn!(job = %job.name(), return_code = job.return_code(), "Spooler job failed");
        }

        self.dispatch_callback(&job);

        if job.is_termination() {
            let executed = self.terminations_executed.fetch_add(1, Ordering::AcqRel) + 1;
            if executed == self.worker_count() {
                self.tear_down();
            }
        }

        drop(job);

        if self.jobs_pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.drain_lock.lock();
            self.all_done.notify_all();
        }
    }

    fn dispatch_callback(&self, job: &Job) {
        let callback = self.callback.read();
        let Some(callback) = callback.as_ref() else {
            return;
        };

        let result = match job {
            Job::Transform(transform) => SpoolerResult::Processed {
                local_path: &transform.local_path,
                return_code: job.return_code(),
                content_hash: transform.content_hash(),
            },
            Job::Transfer(transfer) => SpoolerResult::Copied {
                local_path: &transfer.local_path,
                return_code: job.return_code(),
            },
            Job::Termination => return,
        };

        // completion bookkeeping must still run after a panicking callback
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&result))) {
            warn!(
                job = %job.name(),
                panic = %panic_message(payload.as_ref()),
                "Spooler callback panicked"
            );
        }
    }

    fn tear_down(&self) {
        self.set_state(SpoolerState::TornDown);
        let count = self.teardowns.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert_eq!(count, 1, "spooler torn down more than once");
        info!(
            workers = self.worker_count(),
            failed = self.jobs_failed.load(Ordering::Acquire),
            "All workers terminated, spooler torn down"
        );
    }

    fn wait_for_drain(&self) {
        let mut guard = self.drain_lock.lock();
        while self.jobs_pending.load(Ordering::Acquire) > 0 {
            self.all_done.wait(&mut guard);
        }
    }
}

/// Concurrent upload spooler
///
/// Producers submit jobs from any number of threads sharing `&Spooler`;
/// a fixed pool of worker threads executes them in FIFO order.
pub struct Spooler {
    shared: Arc<SpoolerShared>,
    workers: Vec<Worker>,
    move_mode: AtomicBool,
}

impl Spooler {
    /// Parse a definition string and build a running spooler
    ///
    /// # Errors
    ///
    /// An invalid definition string is not a panic here: it is returned as
    /// [`SpoolerError::Definition`](crate::SpoolerError::Definition) and no
    /// workers are started. Backend construction or thread spawn failures
    /// are returned as [`SpoolerError::Worker`](crate::SpoolerError::Worker)
    /// after the workers already started have been stopped and joined.
    pub fn construct(definition: &str, max_pending_jobs: usize) -> Result<Self> {
        let definition = SpoolerDefinition::parse(definition, max_pending_jobs)?;
        Self::new(definition)
    }

    /// Build a running spooler using the definition's storage driver
    pub fn new(definition: SpoolerDefinition) -> Result<Self> {
        let factory = definition_factory(&definition);
        Self::with_backend(definition, factory)
    }

    /// Build a running spooler with a custom backend per worker
    ///
    /// `factory` is called once per worker id on the calling thread before
    /// that worker starts.
    pub fn with_backend<F>(definition: SpoolerDefinition, factory: F) -> Result<Self>
    where
        F: Fn(usize) -> BackendResult<Box<dyn PushBackend>>,
    {
        let mut spooler = Self {
            shared: Arc::new(SpoolerShared::new(definition)),
            workers: Vec::new(),
            move_mode: AtomicBool::new(false),
        };
        spooler.initialize(factory)?;
        Ok(spooler)
    }

    fn initialize<F>(&mut self, factory: F) -> Result<()>
    where
        F: Fn(usize) -> BackendResult<Box<dyn PushBackend>>,
    {
        let definition = &self.shared.definition;
        info!(
            driver = %definition.driver_type,
            description = %definition.spooler_description,
            workers = definition.worker_count,
            capacity = definition.max_pending_jobs,
            "Initializing spooler"
        );

        for id in 0..self.shared.worker_count() {
            let spawned = factory(id)
                .map_err(|source| WorkerError::BackendInit { id, source })
                .and_then(|backend| Worker::spawn(id, Arc::clone(&self.shared), backend));

            match spawned {
                Ok(worker) => self.workers.push(worker),
                Err(e) => {
                    warn!(error = %e, "Failed to spawn concurrent push workers");
                    self.abort_workers();
                    return Err(e.into());
                }
            }
        }

        self.shared.set_state(SpoolerState::Initialized);
        info!(count = self.workers.len(), "Workers spawned");
        Ok(())
    }

    /// Stop the workers started by a failed `initialize`
    fn abort_workers(&mut self) {
        for _ in 0..self.workers.len() {
            self.shared.schedule(Job::Termination);
        }
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker failed to join cleanly");
            }
        }
    }

    fn open_transaction(&self, operation: &str) {
        if let Err(state) = self.shared.open_transaction() {
            panic!("{} called on spooler in state {:?}", operation, state);
        }
    }

    /// Queue a transfer of `local_path` to `remote_path`
    ///
    /// Blocks while the queue is full.
    ///
    /// # Panics
    ///
    /// Panics after [`Spooler::end_of_transaction`].
    pub fn submit_transfer(&self, local_path: impl Into<PathBuf>, remote_path: impl Into<String>) {
        self.open_transaction("submit_transfer");
        let job = TransferJob::new(local_path, remote_path, self.move_mode());
        debug!(
            source = %job.local_path.display(),
            dest = %job.remote_path,
            move_source = job.move_source,
            "Spooler received transfer"
        );
        self.shared.schedule(Job::Transfer(job));
    }

    /// Queue a transform of `local_path` into `remote_dir` with `suffix`
    ///
    /// Blocks while the queue is full.
    ///
    /// # Panics
    ///
    /// Panics after [`Spooler::end_of_transaction`].
    pub fn submit_transform(
        &self,
        local_path: impl Into<PathBuf>,
        remote_dir: impl Into<String>,
        suffix: impl Into<String>,
    ) {
        self.open_transaction("submit_transform");
        let job = TransformJob::new(local_path, remote_dir, suffix, self.move_mode());
        debug!(
            source = %job.local_path.display(),
            dest = %job.remote_dir,
            suffix = %job.file_suffix,
            move_source = job.move_source,
            "Spooler received transform"
        );
        self.shared.schedule(Job::Transform(job));
    }

    /// Close the transaction and schedule one termination job per worker
    ///
    /// Termination jobs queue behind everything submitted before this
    /// call, so all prior work is executed before any worker exits.
    ///
    /// # Panics
    ///
    /// Panics when called twice or on a spooler that is not running.
    pub fn end_of_transaction(&self) {
        if let Err(state) = self.shared.close_transaction() {
            panic!("end_of_transaction called on spooler in state {:?}", state);
        }
        self.shared.schedule_terminations();
    }

    /// Block until every submitted job has finished
    ///
    /// Does not stop the workers; usable as a drain barrier between
    /// batches.
    pub fn wait_for_upload(&self) {
        debug!(
            pending = self.shared.jobs_pending.load(Ordering::Acquire),
            "Waiting for all jobs to be finished"
        );
        self.shared.wait_for_drain();
        debug!("Jobs are done");
    }

    /// Register the completion callback
    ///
    /// The callback runs on worker threads and must not call back into
    /// `set_callback`/`unset_callback`.
    ///
    /// # Panics
    ///
    /// Panics if a callback is already registered.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&SpoolerResult<'_>) + Send + Sync + 'static,
    {
        let mut slot = self.shared.callback.write();
        assert!(slot.is_none(), "spooler callback already registered");
        *slot = Some(Box::new(callback));
    }

    /// Drop the registered callback, if any
    pub fn unset_callback(&self) {
        self.shared.callback.write().take();
    }

    /// Whether a callback is registered
    pub fn has_callback(&self) -> bool {
        self.shared.callback.read().is_some()
    }

    /// Move (instead of copy) sources of subsequently submitted jobs
    pub fn set_move_mode(&self, move_mode: bool) {
        self.move_mode.store(move_mode, Ordering::Relaxed);
    }

    /// Current move mode
    pub fn move_mode(&self) -> bool {
        self.move_mode.load(Ordering::Relaxed)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.shared.worker_count()
    }

    /// Number of failed jobs so far
    pub fn number_of_failed_jobs(&self) -> u64 {
        self.shared.jobs_failed.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SpoolerState {
        self.shared.state()
    }

    /// Definition the spooler was built from
    pub fn definition(&self) -> &SpoolerDefinition {
        &self.shared.definition
    }

    /// Snapshot of all counters
    pub fn stats(&self) -> SpoolerStats {
        let (jobs_executed, _) = aggregate_stats(&self.workers);

        SpoolerStats {
            jobs_pending: self.shared.jobs_pending.load(Ordering::Acquire),
            jobs_failed: self.number_of_failed_jobs(),
            jobs_executed,
            terminations_executed: self.shared.terminations_executed.load(Ordering::Acquire),
            worker_count: self.worker_count(),
            state: self.state(),
            queue: self.shared.queue.stats().snapshot(),
        }
    }

    #[cfg(test)]
    fn teardown_count(&self) -> usize {
        self.shared.teardowns.load(Ordering::Acquire)
    }
}

impl Drop for Spooler {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        if self.shared.close_transaction().is_ok() {
            self.shared.schedule_terminations();
        }

        for worker in self.workers.drain(..) {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed to join cleanly");
            }
        }

        debug!("Spooler backend terminates");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use std::thread;
    use std::time::Duration;

    /// Succeeds unless the source path contains "fail"; panics on "boom"
    struct ScriptedBackend {
        delay: Duration,
    }

    impl PushBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn transfer(&mut self, job: &TransferJob) -> BackendResult<()> {
            thread::sleep(self.delay);
            if job.local_path.to_string_lossy().contains("boom") {
                panic!("backend exploded on {}", job.local_path.display());
            }
            if job.local_path.to_string_lossy().contains("fail") {
                return Err(BackendError::io(
                    &job.local_path,
                    std::io::Error::from_raw_os_error(5),
                ));
            }
            Ok(())
        }

        fn transform(&mut self, job: &TransformJob) -> BackendResult<String> {
            thread::sleep(self.delay);
            if job.local_path.to_string_lossy().contains("fail") {
                return Err(BackendError::RemoteStatus {
                    key: job.remote_dir.clone(),
                    status: 500,
                });
            }
            Ok(format!("hash:{}", job.local_path.display()))
        }
    }

    fn spooler(workers: usize, capacity: usize, delay: Duration) -> Spooler {
        let definition = SpoolerDefinition::parse("local:/unused,out,in", capacity)
            .unwrap()
            .with_workers(workers)
            .unwrap();
        Spooler::with_backend(definition, move |_| {
            Ok(Box::new(ScriptedBackend { delay }) as Box<dyn PushBackend>)
        })
        .unwrap()
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        Copied(PathBuf, i32),
        Processed(PathBuf, i32, String),
    }

    fn recording_callback(spooler: &Spooler) -> Arc<Mutex<Vec<Seen>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        spooler.set_callback(move |result| {
            let entry = match *result {
                SpoolerResult::Copied {
                    local_path,
                    return_code,
                } => Seen::Copied(local_path.to_path_buf(), return_code),
                SpoolerResult::Processed {
                    local_path,
                    return_code,
                    content_hash,
                } => Seen::Processed(local_path.to_path_buf(), return_code, content_hash.to_string()),
            };
            sink.lock().push(entry);
        });
        seen
    }

    #[test]
    fn test_initialize_spawns_workers() {
        let spooler = spooler(3, 8, Duration::ZERO);
        assert_eq!(spooler.state(), SpoolerState::Initialized);
        assert_eq!(spooler.worker_count(), 3);
        assert_eq!(spooler.stats().jobs_pending, 0);
    }

    #[test]
    fn test_callback_payloads() {
        let spooler = spooler(2, 4, Duration::ZERO);
        let seen = recording_callback(&spooler);

        spooler.submit_transfer("/src/a", "dst/a");
        spooler.submit_transform("/src/b", "data", "C");
        spooler.submit_transfer("/src/fail", "dst/fail");
        spooler.wait_for_upload();

        let mut seen = seen.lock().clone();
        seen.sort_by_key(|s| format!("{:?}", s));
        assert_eq!(
            seen,
            vec![
                Seen::Copied(PathBuf::from("/src/a"), 0),
                Seen::Copied(PathBuf::from("/src/fail"), 5),
                Seen::Processed(PathBuf::from("/src/b"), 0, "hash:/src/b".into()),
            ]
        );
        assert_eq!(spooler.number_of_failed_jobs(), 1);
    }

    #[test]
    fn test_termination_never_reaches_callback() {
        let spooler = spooler(4, 4, Duration::ZERO);
        let seen = recording_callback(&spooler);

        spooler.end_of_transaction();
        spooler.wait_for_upload();

        assert!(seen.lock().is_empty());
        assert_eq!(spooler.state(), SpoolerState::TornDown);
        assert_eq!(spooler.number_of_failed_jobs(), 0);
    }

    #[test]
    fn test_failed_counter_matches_outcomes() {
        let spooler = spooler(4, 3, Duration::ZERO);
        let mut expected_failures = 0;

        for i in 0..60 {
            if i % 7 == 0 {
                expected_failures += 1;
                spooler.submit_transfer(format!("/src/fail-{}", i), "x");
            } else if i % 2 == 0 {
                spooler.submit_transform(format!("/src/{}", i), "data", "");
            } else {
                spooler.submit_transfer(format!("/src/{}", i), "x");
            }
        }
        spooler.wait_for_upload();

        let stats = spooler.stats();
        assert_eq!(stats.jobs_failed, expected_failures);
        assert_eq!(stats.jobs_executed, 60);
        assert_eq!(stats.jobs_pending, 0);
    }

    #[test]
    fn test_end_of_transaction_drains_prior_work() {
        let spooler = spooler(5, 4, Duration::from_millis(1));
        let seen = recording_callback(&spooler);

        for i in 0..40 {
            spooler.submit_transfer(format!("/src/{}", i), "x");
        }
        spooler.end_of_transaction();
        spooler.wait_for_upload();

        let stats = spooler.stats();
        assert_eq!(seen.lock().len(), 40);
        assert_eq!(stats.terminations_executed, 5);
        assert_eq!(stats.queue.enqueued, 45);
        assert_eq!(stats.state, SpoolerState::TornDown);
        assert!(stats.queue.peak_len <= 4);
    }

    #[test]
    fn test_teardown_happens_once() {
        for _ in 0..20 {
            let spooler = spooler(8, 16, Duration::ZERO);
            spooler.end_of_transaction();
            spooler.wait_for_upload();

            assert_eq!(spooler.teardown_count(), 1);
            assert_eq!(spooler.stats().terminations_executed, 8);
        }
    }

    #[test]
    fn test_wait_for_upload_between_batches() {
        let spooler = spooler(3, 2, Duration::from_millis(1));
        let seen = recording_callback(&spooler);

        for round in 1..=5 {
            for i in 0..10 {
                spooler.submit_transfer(format!("/src/{}-{}", round, i), "x");
            }
            spooler.wait_for_upload();
            assert_eq!(spooler.stats().jobs_pending, 0);
            assert_eq!(seen.lock().len(), round * 10);
        }

        assert_eq!(spooler.state(), SpoolerState::TransactionOpen);
    }

    #[test]
    fn test_concurrent_producers() {
        let spooler = spooler(4, 3, Duration::ZERO);
        let seen = recording_callback(&spooler);

        thread::scope(|s| {
            for p in 0..4 {
                let spooler = &spooler;
                s.spawn(move || {
                    for i in 0..50 {
                        spooler.submit_transform(format!("/src/{}-{}", p, i), "data", "");
                    }
                });
            }
        });
        spooler.end_of_transaction();
        spooler.wait_for_upload();

        assert_eq!(seen.lock().len(), 200);
        assert!(spooler.stats().queue.peak_len <= 3);
    }

    #[test]
    fn test_move_mode_is_stamped_on_jobs() {
        let spooler = spooler(1, 4, Duration::ZERO);
        assert!(!spooler.move_mode());
        spooler.set_move_mode(true);
        assert!(spooler.move_mode());
    }

    #[test]
    fn test_unset_callback() {
        let spooler = spooler(1, 4, Duration::ZERO);
        let seen = recording_callback(&spooler);
        assert!(spooler.has_callback());

        spooler.unset_callback();
        spooler.unset_callback();
        assert!(!spooler.has_callback());

        spooler.submit_transfer("/src/a", "x");
        spooler.wait_for_upload();
        assert!(seen.lock().is_empty());

        // a new callback may be registered after unset
        let _seen = recording_callback(&spooler);
    }

    #[test]
    fn test_backend_init_failure() {
        let definition = SpoolerDefinition::parse("local:/unused,out,in", 4)
            .unwrap()
            .with_workers(4)
            .unwrap();

        let result = Spooler::with_backend(definition, |id| {
            if id == 2 {
                Err(BackendError::RemoteTransport {
                    key: "store".into(),
                    reason: "unreachable".into(),
                })
            } else {
                Ok(Box::new(ScriptedBackend {
                    delay: Duration::ZERO,
                }) as Box<dyn PushBackend>)
            }
        });

        assert!(matches!(
            result,
            Err(crate::error::SpoolerError::Worker(WorkerError::BackendInit { id: 2, .. }))
        ));
    }

    #[test]
    fn test_drop_closes_open_transaction() {
        let spooler = spooler(2, 4, Duration::from_millis(1));
        let seen = recording_callback(&spooler);
        for i in 0..10 {
            spooler.submit_transfer(format!("/src/{}", i), "x");
        }
        drop(spooler);

        assert_eq!(seen.lock().len(), 10);
    }

    #[test]
    fn test_backend_panic_fails_only_that_job() {
        let spooler = spooler(2, 4, Duration::ZERO);
        let seen = recording_callback(&spooler);

        spooler.submit_transfer("/src/boom", "x");
        spooler.submit_transfer("/src/ok", "x");
        spooler.submit_transfer("/src/boom-again", "x");
        spooler.end_of_transaction();
        spooler.wait_for_upload();

        let stats = spooler.stats();
        assert_eq!(stats.state, SpoolerState::TornDown);
        assert_eq!(stats.terminations_executed, 2);
        assert_eq!(stats.jobs_pending, 0);
        assert_eq!(stats.jobs_failed, 2);

        let mut seen = seen.lock().clone();
        seen.sort_by_key(|s| format!("{:?}", s));
        assert_eq!(
            seen,
            vec![
                Seen::Copied(PathBuf::from("/src/boom"), -1),
                Seen::Copied(PathBuf::from("/src/boom-again"), -1),
                Seen::Copied(PathBuf::from("/src/ok"), 0),
            ]
        );
    }

    #[test]
    fn test_callback_panic_does_not_block_drain() {
        let spooler = spooler(2, 2, Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        spooler.set_callback(move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            if result.local_path().to_string_lossy().contains("loud") {
                panic!("callback exploded");
            }
        });

        for i in 0..10 {
            spooler.submit_transfer(format!("/src/loud-{}", i), "x");
            spooler.submit_transfer(format!("/src/quiet-{}", i), "x");
        }
        spooler.end_of_transaction();
        spooler.wait_for_upload();

        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert_eq!(spooler.state(), SpoolerState::TornDown);
        assert_eq!(spooler.number_of_failed_jobs(), 0);
    }

    #[test]
    fn test_racing_end_of_transaction_closes_once() {
        let spooler = spooler(4, 16, Duration::ZERO);

        let closed: Vec<bool> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| spooler.end_of_transaction()))
                .collect();
            handles.into_iter().map(|h| h.join().is_ok()).collect()
        });
        spooler.wait_for_upload();

        assert_eq!(closed.iter().filter(|ok| **ok).count(), 1);
        let stats = spooler.stats();
        assert_eq!(stats.queue.enqueued, 4);
        assert_eq!(stats.terminations_executed, 4);
        assert_eq!(spooler.teardown_count(), 1);
    }

    #[test]
    fn test_submit_after_teardown_leaves_state_alone() {
        // more workers than queue slots: a second round of terminations
        // would block forever in drop
        let spooler = spooler(4, 2, Duration::ZERO);
        spooler.end_of_transaction();
        spooler.wait_for_upload();
        assert_eq!(spooler.state(), SpoolerState::TornDown);

        let late = panic::catch_unwind(AssertUnwindSafe(|| spooler.submit_transfer("/src/late", "x")));
        assert!(late.is_err());
        assert_eq!(spooler.state(), SpoolerState::TornDown);
        assert_eq!(spooler.stats().queue.enqueued, 4);

        drop(spooler);
    }

    #[test]
    #[should_panic(expected = "end_of_transaction called")]
    fn test_double_end_of_transaction_panics() {
        let spooler = spooler(1, 4, Duration::ZERO);
        spooler.end_of_transaction();
        spooler.end_of_transaction();
    }

    #[test]
    #[should_panic(expected = "submit_transfer called")]
    fn test_submit_after_close_panics() {
        let spooler = spooler(1, 4, Duration::ZERO);
        spooler.end_of_transaction();
        spooler.submit_transfer("/src/late", "x");
    }

    #[test]
    #[should_panic(expected = "callback already registered")]
    fn test_second_callback_panics() {
        let spooler = spooler(1, 4, Duration::ZERO);
        spooler.set_callback(|_| {});
        spooler.set_callback(|_| {});
    }
}
