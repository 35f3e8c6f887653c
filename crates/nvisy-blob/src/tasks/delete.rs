//! Deletion of blobs and containers.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{check_cancelled, non_blank};
use crate::store::{BlobStore, DeleteBlobOptions};
use crate::types::SnapshotDeleteOption;
use crate::{Result, TRACING_TARGET_TASKS};

/// Parameters of [`delete_blob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBlobInput {
    /// Container holding the blob.
    pub container: String,
    /// Name of the blob.
    pub blob_name: String,
    /// Only delete if the blob still has this etag.
    #[serde(default)]
    pub verify_etag_when_deleting: Option<String>,
    /// Snapshot handling.
    #[serde(default)]
    pub snapshot_delete_option: SnapshotDeleteOption,
}

impl DeleteBlobInput {
    /// Unconditional delete including snapshots.
    pub fn new(container: impl Into<String>, blob_name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blob_name: blob_name.into(),
            verify_etag_when_deleting: None,
            snapshot_delete_option: SnapshotDeleteOption::default(),
        }
    }
}

/// Parameters of [`delete_container`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContainerInput {
    /// Container to delete.
    pub container: String,
}

/// Result of the delete tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutput {
    /// `true` unless the backend reported a failure.
    pub success: bool,
}

/// Deletes a blob. A missing container or blob counts as success.
#[tracing::instrument(
    name = "task.delete_blob",
    skip(store, input, cancel),
    fields(container = %input.container, blob = %input.blob_name)
)]
pub async fn delete_blob(
    store: &dyn BlobStore,
    input: &DeleteBlobInput,
    cancel: &CancellationToken,
) -> Result<DeleteOutput> {
    const MESSAGE: &str = "error occurred while trying to delete blob";
    check_cancelled(cancel)?;

    let container_exists = store
        .container_exists(&input.container)
        .await
        .map_err(|e| e.wrap_backend("delete_blob", MESSAGE))?;
    if !container_exists {
        tracing::debug!(target: TRACING_TARGET_TASKS, "container does not exist, nothing to delete");
        return Ok(DeleteOutput { success: true });
    }

    let options = DeleteBlobOptions {
        if_match: non_blank(input.verify_etag_when_deleting.as_deref()).map(str::to_owned),
        snapshots: input.snapshot_delete_option,
    };

    check_cancelled(cancel)?;
    let existed = store
        .delete_blob(&input.container, &input.blob_name, &options)
        .await
        .map_err(|e| e.wrap_backend("delete_blob", MESSAGE))?;

    tracing::info!(target: TRACING_TARGET_TASKS, existed, "deleted blob");
    Ok(DeleteOutput { success: true })
}

/// Deletes a container and everything in it. A missing container counts as
/// success.
#[tracing::instrument(
    name = "task.delete_container",
    skip(store, input, cancel),
    fields(container = %input.container)
)]
pub async fn delete_container(
    store: &dyn BlobStore,
    input: &DeleteContainerInput,
    cancel: &CancellationToken,
) -> Result<DeleteOutput> {
    const MESSAGE: &str = "error occurred while trying to delete blob container";
    check_cancelled(cancel)?;

    let existed = store
        .delete_container(&input.container)
        .await
        .map_err(|e| e.wrap_backend("delete_container", MESSAGE))?;

    tracing::info!(target: TRACING_TARGET_TASKS, existed, "deleted container");
    Ok(DeleteOutput { success: true })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use uuid::Uuid;

    use super::*;
    use crate::ErrorKind;
    use crate::providers::MemoryProvider;
    use crate::store::UploadOptions;
    use crate::transform::TransformedStream;

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4())
    }

    async fn store_with_blob(container: &str, blob: &str) -> MemoryProvider {
        let store = MemoryProvider::new();
        store.create_container(container).await.unwrap();
        store
            .upload_stream(
                container,
                blob,
                TransformedStream::Buffer(Bytes::from_static(b"payload")),
                &UploadOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn deletes_existing_blob() {
        let (container, blob) = (unique("box"), unique("blob"));
        let store = store_with_blob(&container, &blob).await;

        let output = delete_blob(
            &store,
            &DeleteBlobInput::new(&container, &blob),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(output.success);
        assert!(!store.exists(&container, &blob).await.unwrap());
    }

    #[tokio::test]
    async fn missing_blob_and_container_succeed() {
        let store = store_with_blob("box", "blob").await;
        let cancel = CancellationToken::new();

        let missing_blob = DeleteBlobInput::new("box", unique("blob"));
        assert!(delete_blob(&store, &missing_blob, &cancel).await.unwrap().success);

        let missing_container = DeleteBlobInput::new(unique("box"), "blob");
        assert!(delete_blob(&store, &missing_container, &cancel).await.unwrap().success);
    }

    #[tokio::test]
    async fn etag_mismatch_is_a_backend_error() {
        let store = store_with_blob("box", "blob").await;
        let input = DeleteBlobInput {
            verify_etag_when_deleting: Some("not-the-etag".into()),
            ..DeleteBlobInput::new("box", "blob")
        };

        let err = delete_blob(&store, &input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(store.exists("box", "blob").await.unwrap());
    }

    #[tokio::test]
    async fn blank_etag_is_ignored() {
        let store = store_with_blob("box", "blob").await;
        let input = DeleteBlobInput {
            verify_etag_when_deleting: Some("  ".into()),
            ..DeleteBlobInput::new("box", "blob")
        };

        assert!(delete_blob(&store, &input, &CancellationToken::new()).await.unwrap().success);
        assert!(!store.exists("box", "blob").await.unwrap());
    }

    #[tokio::test]
    async fn deletes_container() {
        let container = unique("box");
        let store = store_with_blob(&container, "blob").await;
        let cancel = CancellationToken::new();
        let input = DeleteContainerInput {
            container: container.clone(),
        };

        assert!(delete_container(&store, &input, &cancel).await.unwrap().success);
        assert!(!store.container_exists(&container).await.unwrap());
        assert!(delete_container(&store, &input, &cancel).await.unwrap().success);
    }

    #[tokio::test]
    async fn cancelled_delete_touches_nothing() {
        let store = store_with_blob("box", "blob").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = delete_blob(&store, &DeleteBlobInput::new("box", "blob"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(store.exists("box", "blob").await.unwrap());
    }
}
