//! Remote key-value store backend
//!
//! Objects are written with a single `PUT` per job. The store itself sits
//! behind [`KvStore`] so the backend logic does not depend on the wire
//! protocol.

use crate::backend::PushBackend;
use crate::content::{compress_file, object_path};
use crate::error::{BackendError, BackendResult};
use crate::spooler::job::{TransferJob, TransformJob};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs;
use std::time::Duration;
use tracing::trace;

/// Request timeout for store operations
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimal key-value store interface
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: &str, value: Vec<u8>) -> BackendResult<()>;

    /// Check whether `key` exists
    fn exists(&self, key: &str) -> BackendResult<bool>;
}

/// Key-value store reached over HTTP (`PUT`/`HEAD` on `<base_url>/<key>`)
#[derive(Debug, Clone)]
pub struct HttpKvStore {
    base_url: String,
    client: Client,
}

impl HttpKvStore {
    /// Create a store client for `base_url`
    pub fn new(base_url: &str) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::RemoteTransport {
                key: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Full URL of a key
    pub fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

impl KvStore for HttpKvStore {
    fn put(&self, key: &str, value: Vec<u8>) -> BackendResult<()> {
        let response = self
            .client
            .put(self.url(key))
            .body(value)
            .send()
            .map_err(|e| BackendError::RemoteTransport {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::RemoteStatus {
                key: key.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        let response = self
            .client
            .head(self.url(key))
            .send()
            .map_err(|e| BackendError::RemoteTransport {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(BackendError::RemoteStatus {
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Pushes content into a [`KvStore`]
#[derive(Debug, Clone)]
pub struct KvBackend<S> {
    store: S,
}

impl<S: KvStore> KvBackend<S> {
    /// Create a backend on top of `store`
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KvStore> PushBackend for KvBackend<S> {
    fn name(&self) -> &'static str {
        "kv"
    }

    fn transfer(&mut self, job: &TransferJob) -> BackendResult<()> {
        let data = fs::read(&job.local_path).map_err(|e| BackendError::io(&job.local_path, e))?;
        let size = data.len();
        self.store.put(&job.remote_path, data)?;

        if job.move_source {
            fs::remove_file(&job.local_path).map_err(|e| BackendError::io(&job.local_path, e))?;
        }

        trace!(source = %job.local_path.display(), key = %job.remote_path, bytes = size, "Transferred");
        Ok(())
    }

    fn transform(&mut self, job: &TransformJob) -> BackendResult<String> {
        let object = compress_file(&job.local_path)?;
        let key = object_path(&job.remote_dir, &object.content_hash, &job.file_suffix);
        self.store.put(&key, object.data)?;

        if job.move_source {
            fs::remove_file(&job.local_path).map_err(|e| BackendError::io(&job.local_path, e))?;
        }

        trace!(source = %job.local_path.display(), key = %key, "Transformed");
        Ok(object.content_hash)
    }
}
