//! Prelude module for convenient imports.

pub use crate::encoding::TextEncoding;
pub use crate::error::{Error, ErrorKind, Result};
#[cfg(feature = "azure")]
pub use crate::providers::AzureProvider;
pub use crate::providers::{AzureConfig, MemoryProvider, Provider, StoreConfig, connect};
pub use crate::store::{BlobStore, DeleteBlobOptions, UploadOptions};
pub use crate::tasks::{
    DeleteBlobInput, DeleteContainerInput, DestinationFile, ListInput, SourceBlob, UploadInput,
    delete_blob, delete_container, download_blob, list_blobs, read_blob_content, upload_file,
};
pub use crate::types::{BlobKind, EntryKind, FileExistsAction, ListingEntry, SnapshotDeleteOption};
