//! Records returned by downloads.

use bytes::Bytes;

/// Properties of a downloaded blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobProperties {
    /// Number of bytes downloaded.
    pub size: u64,
    /// Stored `Content-Type`, if any.
    pub content_type: Option<String>,
    /// Stored `Content-Encoding`, if any.
    pub content_encoding: Option<String>,
    /// Version token of the blob.
    pub etag: Option<String>,
}

/// Content of a blob downloaded into memory.
#[derive(Debug, Clone)]
pub struct BlobContent {
    /// Raw stored bytes.
    pub data: Bytes,
    /// Stored `Content-Type`, if any.
    pub content_type: Option<String>,
    /// Stored `Content-Encoding`, if any.
    pub content_encoding: Option<String>,
}

impl BlobContent {
    /// Returns `true` if the stored content-encoding is `gzip`.
    pub fn is_gzip(&self) -> bool {
        self.content_encoding
            .as_deref()
            .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
    }
}
