//! Content processing for transform jobs
//!
//! This module provides functions for:
//! - Compressing file content with zlib before it is pushed
//! - Computing SHA-256 content hashes used as object names

pub mod checksum;
pub mod compress;

pub use checksum::{compute_sha256, object_path};
pub use compress::{compress_file, CompressedObject};
