//! Blob storage layout kinds.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Storage layout of a blob.
///
/// Block blobs are written as a whole, page blobs support random-access
/// writes in 512-byte pages and append blobs only grow at the end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum BlobKind {
    /// Append-only blob.
    Append,
    /// Block blob, the default.
    #[default]
    Block,
    /// Random-access page blob.
    Page,
}

/// Kind of a [`ListingEntry`](super::ListingEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, Display, IntoStaticStr)]
pub enum EntryKind {
    /// Block blob.
    Block,
    /// Page blob.
    Page,
    /// Append blob.
    Append,
    /// Virtual directory produced by a hierarchical listing.
    Directory,
}

impl From<BlobKind> for EntryKind {
    fn from(kind: BlobKind) -> Self {
        match kind {
            BlobKind::Append => Self::Append,
            BlobKind::Block => Self::Block,
            BlobKind::Page => Self::Page,
        }
    }
}
