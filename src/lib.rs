//! upload-spooler - Concurrent content upload spooler
//!
//! Accepts transfer and transform requests, queues them with bounded
//! capacity and lets a fixed pool of worker threads push the content to a
//! pluggable storage backend.
//!
//! # Features
//!
//! - **Backpressure**: submissions block once `max_pending_jobs` are queued.
//!
//! - **Deterministic shutdown**: `end_of_transaction` queues one termination
//!   job per worker behind all prior work; the pool is torn down exactly
//!   once, after the last worker finished.
//!
//! - **Pluggable storage**: local directory trees and HTTP key-value stores,
//!   selected by the definition string.
//!
//! # Example
//!
//! ```no_run
//! use upload_spooler::{Spooler, SpoolerResult};
//!
//! let spooler = Spooler::construct("local:/srv/store,/tmp/out,/tmp/in", 100).unwrap();
//! spooler.set_callback(|result: &SpoolerResult<'_>| {
//!     println!("{} -> {}", result.local_path().display(), result.return_code());
//! });
//!
//! spooler.submit_transfer("/etc/hostname", "etc/hostname");
//! spooler.submit_transform("/etc/hosts", "data", "");
//! spooler.end_of_transaction();
//! spooler.wait_for_upload();
//! ```

pub mod backend;
pub mod config;
pub mod content;
pub mod error;
pub mod progress;
pub mod spooler;

pub use config::{CliArgs, DriverType, SpoolConfig, SpoolerDefinition};
pub use error::{BackendError, DefinitionError, Result, SpoolerError, WorkerError};
pub use spooler::{Job, JobKind, Spooler, SpoolerResult, SpoolerState, SpoolerStats};
