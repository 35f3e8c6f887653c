//! Value records shared by the stores and the tasks.

mod blob_kind;
mod listing_entry;
mod policy;

pub use blob_kind::{BlobKind, EntryKind};
pub use listing_entry::ListingEntry;
pub use policy::{FileExistsAction, SnapshotDeleteOption};
