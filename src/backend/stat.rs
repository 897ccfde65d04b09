//! Existence checks against a backend
//!
//! Used by callers that want to skip content already present upstream.

use crate::backend::kv::{HttpKvStore, KvStore};
use crate::config::DriverType;
use crate::error::DefinitionError;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Answers whether a path exists in storage
pub trait BackendStat: Send + Sync {
    /// Check whether `path` exists
    fn exists(&self, path: &str) -> bool;
}

/// Stat against a local directory tree
#[derive(Debug, Clone)]
pub struct LocalStat {
    base_path: PathBuf,
}

impl LocalStat {
    /// Create a stat rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl BackendStat for LocalStat {
    fn exists(&self, path: &str) -> bool {
        Path::new(&format!("{}/{}", self.base_path.display(), path)).exists()
    }
}

/// Stat against a key-value store
#[derive(Debug, Clone)]
pub struct KvStat<S> {
    store: S,
}

impl<S: KvStore> KvStat<S> {
    /// Create a stat on top of `store`
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KvStore> BackendStat for KvStat<S> {
    fn exists(&self, path: &str) -> bool {
        self.store.exists(path).unwrap_or_else(|e| {
            warn!(path = path, error = %e, "Existence check failed");
            false
        })
    }
}

/// Build the stat matching the upstream of a spooler definition
///
/// Only the first comma separated field is inspected; it must be
/// `<driver>:<description>` with a known driver and a non-empty
/// description.
pub fn backend_stat(definition: &str) -> Result<Box<dyn BackendStat>, DefinitionError> {
    backend_stat_inner(definition).inspect_err(|e| {
        error!(definition = definition, error = %e, "Invalid upstream");
    })
}

fn backend_stat_inner(definition: &str) -> Result<Box<dyn BackendStat>, DefinitionError> {
    let invalid = || DefinitionError::InvalidUpstream {
        descriptor: definition.to_string(),
    };

    let upstream = definition.split(',').next().unwrap_or_default();
    let (driver, description) = upstream.split_once(':').ok_or_else(invalid)?;
    if description.is_empty() {
        return Err(invalid());
    }

    match driver.parse::<DriverType>().map_err(|_| invalid())? {
        DriverType::Local => Ok(Box::new(LocalStat::new(description))),
        DriverType::RemoteKv => {
            let store = HttpKvStore::new(description).map_err(|_| invalid())?;
            Ok(Box::new(KvStat::new(store)))
        }
    }
}
