//! Storage backends
//!
//! A backend performs the side-effecting part of a job: placing content
//! in storage. Each worker owns its own backend instance, built once when
//! the spooler starts, so implementations do not need interior locking.
//!
//! # Architecture
//!
//! ```text
//!         ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!         │   Worker 1   │   │   Worker 2   │   │   Worker N   │
//!         │ PushBackend  │   │ PushBackend  │   │ PushBackend  │
//!         └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!                │                  │                  │
//!        ┌───────┴──────────────────┴──────────────────┴───────┐
//!        │     LocalBackend (local:<base>)                     │
//!        │     KvBackend<HttpKvStore> (kv:<url>, riak:<url>)   │
//!        └─────────────────────────────────────────────────────┘
//! ```

pub mod kv;
pub mod local;
pub mod stat;

pub use kv::{HttpKvStore, KvBackend, KvStore};
pub use local::LocalBackend;
pub use stat::{backend_stat, BackendStat, KvStat, LocalStat};

use crate::config::{DriverType, SpoolerDefinition};
use crate::error::BackendResult;
use crate::spooler::job::{Job, JobResult, TransferJob, TransformJob};
use tracing::debug;

/// Pushes job content into storage
pub trait PushBackend: Send {
    /// Backend name for log lines
    fn name(&self) -> &'static str;

    /// Store `job.local_path` at `job.remote_path`
    fn transfer(&mut self, job: &TransferJob) -> BackendResult<()>;

    /// Compress and store `job.local_path`, returning its content hash
    fn transform(&mut self, job: &TransformJob) -> BackendResult<String>;

    /// Execute a job and record the outcome in its result fields
    ///
    /// Failures are captured in the job, never propagated.
    fn execute(&mut self, job: &mut Job) -> bool {
        match job {
            Job::Transfer(transfer) => {
                let result = match self.transfer(transfer) {
                    Ok(()) => JobResult::ok(),
                    Err(e) => {
                        debug!(backend = self.name(), path = %transfer.local_path.display(), error = %e, "Transfer failed");
                        JobResult::failed(e.return_code())
                    }
                };
                transfer.complete(result);
                result.success
            }
            Job::Transform(transform) => match self.transform(transform) {
                Ok(content_hash) => {
                    transform.complete(JobResult::ok(), Some(content_hash));
                    true
                }
                Err(e) => {
                    debug!(backend = self.name(), path = %transform.local_path.display(), error = %e, "Transform failed");
                    transform.complete(JobResult::failed(e.return_code()), None);
                    false
                }
            },
            Job::Termination => true,
        }
    }
}

/// Build the backend selected by a spooler definition
pub fn create_backend(definition: &SpoolerDefinition) -> BackendResult<Box<dyn PushBackend>> {
    match definition.driver_type {
        DriverType::Local => Ok(Box::new(LocalBackend::new(&definition.spooler_description)?)),
        DriverType::RemoteKv => Ok(Box::new(KvBackend::new(HttpKvStore::new(
            &definition.spooler_description,
        )?))),
    }
}

/// Factory that builds the definition's backend for every worker
pub fn definition_factory(
    definition: &SpoolerDefinition,
) -> impl Fn(usize) -> BackendResult<Box<dyn PushBackend>> {
    let definition = definition.clone();
    move |_id| create_backend(&definition)
}
