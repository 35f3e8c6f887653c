//! Per-call options for uploads and deletes.

use std::collections::HashMap;

use crate::types::{BlobKind, SnapshotDeleteOption};

/// Default number of concurrent block uploads.
pub const DEFAULT_PARALLEL_OPERATIONS: usize = 64;

/// Options of [`BlobStore::upload_stream`](super::BlobStore::upload_stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Storage kind of the new blob.
    pub kind: BlobKind,
    /// `Content-Type` stored with the blob.
    pub content_type: String,
    /// `Content-Encoding` stored with the blob.
    pub content_encoding: Option<String>,
    /// Index tags stored with the blob.
    pub tags: HashMap<String, String>,
    /// Replace an existing blob instead of failing.
    pub overwrite: bool,
    /// Upper bound of concurrent chunk uploads, where the backend supports it.
    pub parallel_operations: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            kind: BlobKind::default(),
            content_type: mime_guess::mime::APPLICATION_OCTET_STREAM.to_string(),
            content_encoding: None,
            tags: HashMap::new(),
            overwrite: true,
            parallel_operations: DEFAULT_PARALLEL_OPERATIONS,
        }
    }
}

/// Options of [`BlobStore::delete_blob`](super::BlobStore::delete_blob).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteBlobOptions {
    /// Only delete if the blob's current etag equals this value.
    pub if_match: Option<String>,
    /// Snapshot handling.
    pub snapshots: SnapshotDeleteOption,
}
