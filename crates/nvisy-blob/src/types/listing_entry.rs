//! Flattened listing record.

use serde::{Deserialize, Serialize};

use super::EntryKind;

/// One entry of a blob listing.
///
/// Directory entries never carry an etag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    /// Blob name, or the directory prefix for directory entries.
    pub name: String,
    /// Absolute URI of the blob or virtual directory.
    pub uri: String,
    /// Blob kind or [`EntryKind::Directory`].
    #[serde(rename = "blobType")]
    pub kind: EntryKind,
    /// Version token of the blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ListingEntry {
    /// Returns `true` if this entry is a virtual directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
