//! Listing of a container's blobs.

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{check_cancelled, non_blank};
use crate::store::{BackendListItem, BlobStore};
use crate::types::{EntryKind, ListingEntry};
use crate::{Result, TRACING_TARGET_TASKS};

/// Parameters of [`list_blobs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    /// Container to list.
    pub container: String,
    /// List every blob instead of grouping names at `/`.
    #[serde(default = "default_flat")]
    pub flat_blob_listing: bool,
    /// Only list names starting with this prefix. Blank lists everything.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl ListInput {
    /// Flat listing of the whole container.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            flat_blob_listing: true,
            prefix: None,
        }
    }
}

fn default_flat() -> bool {
    true
}

/// Result of [`list_blobs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutput {
    /// Entries in backend order.
    pub blobs: Vec<ListingEntry>,
}

/// Maps backend listing items onto uniform [`ListingEntry`] records.
///
/// Virtual directories get the container URI joined with the prefix and no
/// etag. Order is preserved.
pub fn flatten_listing(
    store: &dyn BlobStore,
    container: &str,
    items: impl IntoIterator<Item = BackendListItem>,
) -> Vec<ListingEntry> {
    items
        .into_iter()
        .map(|item| match item {
            BackendListItem::Blob {
                name,
                uri,
                kind,
                etag,
            } => ListingEntry {
                name,
                uri,
                kind: kind.into(),
                etag,
            },
            BackendListItem::Prefix { name } => ListingEntry {
                uri: format!("{}/{}", store.container_uri(container), name),
                name,
                kind: EntryKind::Directory,
                etag: None,
            },
        })
        .collect()
}

/// Lists the blobs of a container.
#[tracing::instrument(
    name = "task.list_blobs",
    skip(store, input, cancel),
    fields(container = %input.container, flat = input.flat_blob_listing)
)]
pub async fn list_blobs(
    store: &dyn BlobStore,
    input: &ListInput,
    cancel: &CancellationToken,
) -> Result<ListOutput> {
    check_cancelled(cancel)?;
    let prefix = non_blank(input.prefix.as_deref());

    let items: Vec<BackendListItem> = store
        .list_blobs(&input.container, prefix, input.flat_blob_listing)
        .and_then(|item| async move {
            check_cancelled(cancel)?;
            Ok(item)
        })
        .try_collect()
        .await
        .map_err(|e| e.wrap_backend("list_blobs", "error occurred while listing blobs"))?;

    let blobs = flatten_listing(store, &input.container, items);
    tracing::debug!(target: TRACING_TARGET_TASKS, count = blobs.len(), "listed blobs");

    Ok(ListOutput { blobs })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::ErrorKind;
    use crate::providers::MemoryProvider;
    use crate::store::UploadOptions;
    use crate::transform::TransformedStream;
    use crate::types::BlobKind;

    async fn seeded_store() -> MemoryProvider {
        let store = MemoryProvider::new();
        store.create_container("box").await.unwrap();
        for (name, kind) in [("dir/a.txt", BlobKind::Block), ("b.txt", BlobKind::Append)] {
            let options = UploadOptions {
                kind,
                ..Default::default()
            };
            store
                .upload_stream(
                    "box",
                    name,
                    TransformedStream::Buffer(Bytes::from_static(b"x")),
                    &options,
                    &CancellationToken::new(),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn flat_listing_returns_every_blob() {
        let store = seeded_store().await;
        let output = list_blobs(&store, &ListInput::new("box"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.blobs.len(), 2);
        assert!(output.blobs.iter().all(|entry| !entry.is_directory()));

        let b = output.blobs.iter().find(|e| e.name == "b.txt").unwrap();
        assert_eq!(b.kind, EntryKind::Append);
        assert_eq!(b.uri, "memory://box/b.txt");
        assert!(b.etag.is_some());
    }

    #[tokio::test]
    async fn hierarchical_listing_folds_directories() {
        let store = seeded_store().await;
        let input = ListInput {
            flat_blob_listing: false,
            ..ListInput::new("box")
        };
        let output = list_blobs(&store, &input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.blobs.len(), 2);
        let directories: Vec<_> = output.blobs.iter().filter(|e| e.is_directory()).collect();
        assert_eq!(directories.len(), 1);
        assert_eq!(directories[0].name, "dir/");
        assert_eq!(directories[0].uri, "memory://box/dir/");
        assert_eq!(directories[0].etag, None);
    }

    #[tokio::test]
    async fn prefix_narrows_listing() {
        let store = seeded_store().await;
        let input = ListInput {
            prefix: Some("dir/".into()),
            ..ListInput::new("box")
        };
        let output = list_blobs(&store, &input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.blobs.len(), 1);
        assert_eq!(output.blobs[0].name, "dir/a.txt");
    }

    #[tokio::test]
    async fn missing_container_is_a_backend_error() {
        let store = MemoryProvider::new();
        let err = list_blobs(&store, &ListInput::new("nope"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[test]
    fn serializes_entries_with_blob_type() {
        let store = MemoryProvider::new();
        let entries = flatten_listing(
            &store,
            "box",
            [BackendListItem::Prefix {
                name: "logs/".into(),
            }],
        );
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "logs/",
                "uri": "memory://box/logs/",
                "blobType": "Directory",
            })
        );
    }
}
