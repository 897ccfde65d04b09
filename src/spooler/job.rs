//! Jobs flowing through the spooler queue
//!
//! A job is created by a submission (or by `end_of_transaction` for
//! termination jobs), pushed into the queue, executed by exactly one
//! worker and finally handed to the completion path. Ownership moves along
//! with it, so only the executing worker can write its result.

use std::fmt;
use std::path::{Path, PathBuf};

/// Kind tag of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Copy a file to a remote path
    Transfer,
    /// Compress, hash and store a file under its content hash
    Transform,
    /// Tell the worker that picks it up to exit
    Termination,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::Transfer => "transfer",
            JobKind::Transform => "transform",
            JobKind::Termination => "termination",
        };
        f.write_str(name)
    }
}

/// Result fields of an executed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResult {
    /// Whether the backend succeeded
    pub success: bool,

    /// 0 on success, backend specific code otherwise
    pub return_code: i32,
}

impl JobResult {
    /// Successful result
    pub fn ok() -> Self {
        Self {
            success: true,
            return_code: 0,
        }
    }

    /// Failed result with the given code
    pub fn failed(return_code: i32) -> Self {
        Self {
            success: false,
            return_code,
        }
    }
}

/// Copy `local_path` to `remote_path`
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Source file
    pub local_path: PathBuf,

    /// Destination path relative to the backend root
    pub remote_path: String,

    /// Remove the source after a successful push
    pub move_source: bool,

    result: Option<JobResult>,
}

impl TransferJob {
    /// Create a new transfer job
    pub fn new(local_path: impl Into<PathBuf>, remote_path: impl Into<String>, move_source: bool) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            move_source,
            result: None,
        }
    }

    /// Result, once the job was executed
    pub fn result(&self) -> Option<JobResult> {
        self.result
    }

    /// Store the result
    ///
    /// # Panics
    ///
    /// Panics if the result was already set.
    pub fn complete(&mut self, result: JobResult) {
        assert!(
            self.result.is_none(),
            "transfer job for '{}' completed twice",
            self.local_path.display()
        );
        self.result = Some(result);
    }
}

/// Compress `local_path` and store it under `remote_dir` by content hash
#[derive(Debug, Clone)]
pub struct TransformJob {
    /// Source file
    pub local_path: PathBuf,

    /// Destination directory relative to the backend root
    pub remote_dir: String,

    /// Suffix appended to the stored object name
    pub file_suffix: String,

    /// Remove the source after a successful push
    pub move_source: bool,

    result: Option<JobResult>,
    content_hash: Option<String>,
}

impl TransformJob {
    /// Create a new transform job
    pub fn new(
        local_path: impl Into<PathBuf>,
        remote_dir: impl Into<String>,
        file_suffix: impl Into<String>,
        move_source: bool,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            remote_dir: remote_dir.into(),
            file_suffix: file_suffix.into(),
            move_source,
            result: None,
            content_hash: None,
        }
    }

    /// Result, once the job was executed
    pub fn result(&self) -> Option<JobResult> {
        self.result
    }

    /// Content hash of the stored object (empty when the job failed)
    pub fn content_hash(&self) -> &str {
        self.content_hash.as_deref().unwrap_or("")
    }

    /// Store the result and the content hash
    ///
    /// # Panics
    ///
    /// Panics if the result was already set.
    pub fn complete(&mut self, result: JobResult, content_hash: Option<String>) {
        assert!(
            self.result.is_none(),
            "transform job for '{}' completed twice",
            self.local_path.display()
        );
        self.result = Some(result);
        self.content_hash = content_hash;
    }
}

/// A unit of work in the spooler queue
#[derive(Debug, Clone)]
pub enum Job {
    /// Plain copy
    Transfer(TransferJob),
    /// Compress + hash + store
    Transform(TransformJob),
    /// Poison pill for one worker
    Termination,
}

impl Job {
    /// Kind tag of this job
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Transfer(_) => JobKind::Transfer,
            Job::Transform(_) => JobKind::Transform,
            Job::Termination => JobKind::Termination,
        }
    }

    /// Check if this is a termination job
    pub fn is_termination(&self) -> bool {
        matches!(self, Job::Termination)
    }

    /// Source path, if the job has one
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Job::Transfer(job) => Some(&job.local_path),
            Job::Transform(job) => Some(&job.local_path),
            Job::Termination => None,
        }
    }

    /// Result fields, once executed
    pub fn result(&self) -> Option<JobResult> {
        match self {
            Job::Transfer(job) => job.result(),
            Job::Transform(job) => job.result(),
            Job::Termination => Some(JobResult::ok()),
        }
    }

    /// Termination jobs always succeed; unexecuted jobs never do
    pub fn is_successful(&self) -> bool {
        self.result().is_some_and(|r| r.success)
    }

    /// Return code of the executed job (-1 when not executed)
    pub fn return_code(&self) -> i32 {
        self.result().map_or(-1, |r| r.return_code)
    }

    /// Record a failure unless a result was already stored
    pub(crate) fn fail_unfinished(&mut self, return_code: i32) {
        match self {
            Job::Transfer(job) if job.result.is_none() => {
                job.complete(JobResult::failed(return_code))
            }
            Job::Transform(job) if job.result.is_none() => {
                job.complete(JobResult::failed(return_code), None)
            }
            _ => {}
        }
    }

    /// Short description for log lines
    pub fn name(&self) -> String {
        match self {
            Job::Transfer(job) => format!(
                "transfer {} -> {}",
                job.local_path.display(),
                job.remote_path
            ),
            Job::Transform(job) => format!(
                "transform {} -> {}/*{}",
                job.local_path.display(),
                job.remote_dir,
                job.file_suffix
            ),
            Job::Termination => "termination".to_string(),
        }
    }
}
