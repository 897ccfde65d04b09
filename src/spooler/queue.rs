//! Bounded job queue with backpressure
//!
//! A FIFO shared by every producer and every worker. `put` blocks while
//! the queue is full, `get` blocks while it is empty. Producers are only
//! woken once the queue has drained below `capacity / 2 + 1`, so a busy
//! consumer does not wake them on every single removal.
//!
//! FIFO order matters beyond fairness: termination jobs are queued behind
//! all regular work, which is what lets shutdown drain everything first.

use crate::spooler::job::Job;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::trace;

/// Statistics for the job queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total jobs enqueued
    pub enqueued: AtomicU64,

    /// Total jobs dequeued
    pub dequeued: AtomicU64,

    /// Number of times a producer blocked on a full queue
    pub backpressure_events: AtomicU64,

    /// Highest queue length observed
    pub peak_len: AtomicUsize,
}

impl QueueStats {
    /// Get queue throughput (dequeued jobs)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    /// Get the high-water mark
    pub fn peak(&self) -> usize {
        self.peak_len.load(Ordering::Relaxed)
    }

    /// Copy the counters out
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_count(),
            peak_len: self.peak(),
        }
    }
}

/// Point-in-time copy of [`QueueStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    pub enqueued: u64,
    pub dequeued: u64,
    pub backpressure_events: u64,
    pub peak_len: usize,
}

/// Bounded multi-producer/multi-consumer FIFO of jobs
pub struct JobQueue {
    /// Queued jobs
    jobs: Mutex<VecDeque<Job>>,

    /// Signalled when producers may retry
    not_full: Condvar,

    /// Signalled when a job was added
    not_empty: Condvar,

    /// Queue capacity
    capacity: usize,

    /// Queue statistics
    stats: QueueStats,
}

impl JobQueue {
    /// Create a new job queue with the specified capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "job queue capacity must be at least 1");

        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            stats: QueueStats::default(),
        }
    }

    /// Length below which blocked producers are woken
    pub fn wake_threshold(&self) -> usize {
        self.capacity / 2 + 1
    }

    /// Append a job, blocking while the queue is full
    pub fn put(&self, job: Job) {
        let mut jobs = self.jobs.lock();

        if jobs.len() >= self.capacity {
            self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
            trace!(capacity = self.capacity, "Job queue full, waiting");
            while jobs.len() >= self.capacity {
                self.not_full.wait(&mut jobs);
            }
        }

        jobs.push_back(job);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.stats.peak_len.fetch_max(jobs.len(), Ordering::Relaxed);

        self.not_empty.notify_one();
    }

    /// Remove the head job, blocking while the queue is empty
    pub fn get(&self) -> Job {
        let mut jobs = self.jobs.lock();

        let job = loop {
            if let Some(job) = jobs.pop_front() {
                break job;
            }
            self.not_empty.wait(&mut jobs);
        };
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);

        if jobs.len() < self.wake_threshold() {
            self.not_full.notify_all();
        }

        job
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}
