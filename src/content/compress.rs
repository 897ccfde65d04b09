//! zlib compression of file content

use crate::content::checksum::compute_sha256;
use crate::error::{BackendError, BackendResult};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

/// Compressed content together with its hash
#[derive(Debug, Clone)]
pub struct CompressedObject {
    /// zlib compressed bytes
    pub data: Vec<u8>,

    /// SHA-256 of `data`, hex encoded
    pub content_hash: String,

    /// Size of the uncompressed input
    pub original_size: u64,
}

/// Compress a file and hash the compressed result
pub fn compress_file(path: &Path) -> BackendResult<CompressedObject> {
    let file = File::open(path).map_err(|e| BackendError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let original_size = io::copy(&mut reader, &mut encoder).map_err(|e| BackendError::io(path, e))?;
    encoder.flush().map_err(|e| BackendError::Compression {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let data = encoder.finish().map_err(|e| BackendError::Compression {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let content_hash = compute_sha256(&data);

    Ok(CompressedObject {
        data,
        content_hash,
        original_size,
    })
}
