//! The blob store capability used by the tasks.
//!
//! [`BlobStore`] is the seam between task orchestration and a concrete storage
//! backend. Implementations live in [`providers`](crate::providers); the tasks
//! only ever see `&dyn BlobStore`.

use std::path::Path;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::transform::TransformedStream;

mod blob_content;
mod list_item;
mod options;

pub use blob_content::{BlobContent, BlobProperties};
pub use list_item::BackendListItem;
pub use options::{DEFAULT_PARALLEL_OPERATIONS, DeleteBlobOptions, UploadOptions};

/// Boxed stream of listing items returned by [`BlobStore::list_blobs`].
pub type ListStream<'a> = BoxStream<'a, Result<BackendListItem>>;

/// Container and blob operations of a storage backend.
///
/// Credentials, retries and the wire protocol are the implementation's
/// concern. Methods returning `bool` report whether something changed or
/// exists; failures are returned as errors.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Unique identifier of the backend (e.g. "memory", "azure").
    fn id(&self) -> &'static str;

    /// Absolute URI of `container`, without a trailing slash.
    fn container_uri(&self, container: &str) -> String;

    /// Absolute URI of `blob` inside `container`.
    fn blob_uri(&self, container: &str, blob: &str) -> String {
        format!("{}/{}", self.container_uri(container), blob)
    }

    /// Returns `true` if `container` exists.
    async fn container_exists(&self, container: &str) -> Result<bool>;

    /// Creates `container`, returning `true` if it did not exist before.
    async fn create_container(&self, container: &str) -> Result<bool>;

    /// Deletes `container` and its blobs, returning `true` if it existed.
    async fn delete_container(&self, container: &str) -> Result<bool>;

    /// Returns `true` if `blob` exists in `container`.
    async fn exists(&self, container: &str, blob: &str) -> Result<bool>;

    /// Uploads `body` as `blob` and returns the blob URI.
    ///
    /// Fails if the blob exists and [`UploadOptions::overwrite`] is not set.
    async fn upload_stream(
        &self,
        container: &str,
        blob: &str,
        body: TransformedStream,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Streams `blob` into the file at `destination`, creating or truncating it.
    async fn download_to_path(
        &self,
        container: &str,
        blob: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<BlobProperties>;

    /// Downloads the whole content of `blob` into memory.
    async fn download_content(&self, container: &str, blob: &str) -> Result<BlobContent>;

    /// Deletes `blob`, returning `true` if it existed.
    async fn delete_blob(
        &self,
        container: &str,
        blob: &str,
        options: &DeleteBlobOptions,
    ) -> Result<bool>;

    /// Lists the blobs of `container` whose names start with `prefix`.
    ///
    /// In hierarchical mode (`flat == false`) names are grouped at the next
    /// `/` after the prefix and each group is reported once as a
    /// [`BackendListItem::Prefix`]. Items come in the backend's native order.
    fn list_blobs<'a>(
        &'a self,
        container: &'a str,
        prefix: Option<&'a str>,
        flat: bool,
    ) -> ListStream<'a>;
}
