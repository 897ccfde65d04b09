//! Local filesystem backend
//!
//! Content is stored below a base directory. Transfers keep the remote
//! path as given; transforms store compressed content under
//! `<remote_dir>/<hh>/<rest><suffix>`.

use crate::backend::PushBackend;
use crate::content::{compress_file, object_path};
use crate::error::{BackendError, BackendResult};
use crate::spooler::job::{TransferJob, TransformJob};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// errno for a rename across filesystems
const EXDEV: i32 = 18;

/// Pushes content into a local directory tree
#[derive(Debug, Clone)]
pub struct LocalBackend {
    base_path: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `base_path`, creating it if missing
    pub fn new(base_path: impl AsRef<Path>) -> BackendResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| BackendError::io(&base_path, e))?;
        Ok(Self { base_path })
    }

    /// Storage root
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Absolute destination for a remote path
    pub fn destination(&self, remote_path: &str) -> PathBuf {
        self.base_path.join(remote_path.trim_start_matches('/'))
    }

    fn ensure_parent(path: &Path) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
        }
        Ok(())
    }

    fn move_file(source: &Path, dest: &Path) -> BackendResult<()> {
        match fs::rename(source, dest) {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(EXDEV) => {
                fs::copy(source, dest).map_err(|e| BackendError::io(dest, e))?;
                fs::remove_file(source).map_err(|e| BackendError::io(source, e))
            }
            Err(e) => Err(BackendError::io(source, e)),
        }
    }
}

impl PushBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn transfer(&mut self, job: &TransferJob) -> BackendResult<()> {
        let dest = self.destination(&job.remote_path);
        Self::ensure_parent(&dest)?;

        if job.move_source {
            Self::move_file(&job.local_path, &dest)?;
        } else {
            fs::copy(&job.local_path, &dest).map_err(|e| BackendError::io(&job.local_path, e))?;
        }

        trace!(source = %job.local_path.display(), dest = %dest.display(), "Transferred");
        Ok(())
    }

    fn transform(&mut self, job: &TransformJob) -> BackendResult<String> {
        let object = compress_file(&job.local_path)?;
        let dest = self.destination(&object_path(
            &job.remote_dir,
            &object.content_hash,
            &job.file_suffix,
        ));
        Self::ensure_parent(&dest)?;

        // write next to the destination, then rename into place
        let mut partial = dest.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        if let Err(e) = fs::write(&partial, &object.data) {
            let _ = fs::remove_file(&partial);
            return Err(BackendError::io(&partial, e));
        }
        if let Err(e) = fs::rename(&partial, &dest) {
            let _ = fs::remove_file(&partial);
            return Err(BackendError::io(&dest, e));
        }

        if job.move_source {
            fs::remove_file(&job.local_path).map_err(|e| BackendError::io(&job.local_path, e))?;
        }

        trace!(
            source = %job.local_path.display(),
            dest = %dest.display(),
            original = object.original_size,
            compressed = object.data.len(),
            "Transformed"
        );
        Ok(object.content_hash)
    }
}
