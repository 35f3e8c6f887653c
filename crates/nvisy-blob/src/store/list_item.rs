//! Raw listing items as reported by a backend.

use crate::types::BlobKind;

/// One item of a backend listing, before flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendListItem {
    /// A stored blob.
    Blob {
        /// Full blob name.
        name: String,
        /// Absolute blob URI.
        uri: String,
        /// Storage kind.
        kind: BlobKind,
        /// Version token.
        etag: Option<String>,
    },
    /// A virtual directory of a hierarchical listing, e.g. `logs/2024/`.
    Prefix {
        /// The prefix including its trailing delimiter.
        name: String,
    },
}
