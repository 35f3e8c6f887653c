//! Upload of a local file into a blob.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{check_cancelled, non_blank};
use crate::store::{BlobStore, DEFAULT_PARALLEL_OPERATIONS, DeleteBlobOptions, UploadOptions};
use crate::transform::{StreamTransformer, TransformOptions};
use crate::types::BlobKind;
use crate::{Error, Result, TRACING_TARGET_TASKS};

const OPERATION: &str = "upload_file";

/// What to upload and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInput {
    /// Local file to upload.
    pub source_file: PathBuf,
    /// Destination container.
    pub container: String,
    /// Blob name; defaults to the source file name.
    #[serde(default, alias = "renameTo")]
    pub blob_name: Option<String>,
    /// Storage kind of the blob.
    #[serde(default)]
    pub blob_kind: BlobKind,
    /// Replace an existing blob.
    #[serde(default = "default_true")]
    pub overwrite: bool,
    /// Create the container when it does not exist.
    #[serde(default = "default_true")]
    pub create_container: bool,
    /// Gzip the content.
    #[serde(default)]
    pub compress: bool,
    /// Re-encode the file as text in [`encoding`](Self::encoding).
    #[serde(default)]
    pub treat_as_text: bool,
    /// Target text encoding.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Content type; guessed from the file extension when absent.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Index tags of the blob.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Upper bound of concurrent chunk uploads.
    #[serde(default = "default_parallel_operations")]
    pub parallel_operations: usize,
}

impl UploadInput {
    /// Input with defaults for everything but the source and container.
    pub fn new(source_file: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            container: container.into(),
            blob_name: None,
            blob_kind: BlobKind::default(),
            overwrite: true,
            create_container: true,
            compress: false,
            treat_as_text: false,
            encoding: default_encoding(),
            content_type: None,
            tags: HashMap::new(),
            parallel_operations: DEFAULT_PARALLEL_OPERATIONS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    "utf-8".to_owned()
}

fn default_parallel_operations() -> usize {
    DEFAULT_PARALLEL_OPERATIONS
}

/// Result of [`upload_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutput {
    /// URI of the uploaded blob.
    pub uri: String,
    /// The uploaded local file.
    pub source_file: String,
}

/// Uploads a local file, creating the container when requested.
#[tracing::instrument(
    name = "task.upload_file",
    skip(store, input, cancel),
    fields(container = %input.container, source = %input.source_file.display())
)]
pub async fn upload_file(
    store: &dyn BlobStore,
    input: &UploadInput,
    cancel: &CancellationToken,
) -> Result<UploadOutput> {
    check_cancelled(cancel)?;

    let source = input.source_file.as_path();
    let is_file = tokio::fs::metadata(source)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(Error::invalid_argument(format!(
            "source file {} does not exist",
            source.display()
        )));
    }

    let transform = TransformOptions::new(input.compress, input.treat_as_text, &input.encoding)?;
    let blob = blob_name(input, source)?;
    let wrap = |e: Error| e.wrap_backend(OPERATION, "error occurred while uploading file to blob storage");

    check_cancelled(cancel)?;
    if input.create_container && store.create_container(&input.container).await.map_err(wrap)? {
        tracing::info!(target: TRACING_TARGET_TASKS, container = %input.container, "created container");
    }

    if input.overwrite && store.exists(&input.container, &blob).await.map_err(wrap)? {
        store
            .delete_blob(&input.container, &blob, &DeleteBlobOptions::default())
            .await
            .map_err(wrap)?;
    }

    let body = StreamTransformer::transform(source, &transform).await?;
    let size = body.len().await?;
    let options = UploadOptions {
        kind: input.blob_kind,
        content_type: content_type(input, source),
        content_encoding: Some(if input.compress {
            "gzip".to_owned()
        } else {
            transform.encoding.name().to_owned()
        }),
        tags: input.tags.clone(),
        overwrite: input.overwrite,
        parallel_operations: input.parallel_operations,
    };

    check_cancelled(cancel)?;
    let uri = store
        .upload_stream(&input.container, &blob, body, &options, cancel)
        .await
        .map_err(wrap)?;

    tracing::info!(target: TRACING_TARGET_TASKS, uri = %uri, kind = %input.blob_kind, size, "uploaded file");
    Ok(UploadOutput {
        uri,
        source_file: source.display().to_string(),
    })
}

fn blob_name(input: &UploadInput, source: &Path) -> Result<String> {
    if let Some(name) = non_blank(input.blob_name.as_deref()) {
        return Ok(name.to_owned());
    }

    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::invalid_argument(format!("source file {} has no file name", source.display()))
        })
}

fn content_type(input: &UploadInput, source: &Path) -> String {
    match non_blank(input.content_type.as_deref()) {
        Some(content_type) => content_type.to_owned(),
        None => mime_guess::from_path(source)
            .first_or_octet_stream()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;
    use crate::providers::MemoryProvider;
    use crate::transform::gunzip;

    async fn write_source(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn uploads_file_into_new_container() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "TestFile.xml", "<root/>").await;
        let store = MemoryProvider::new();

        let input = UploadInput::new(&source, "test-container");
        let output = upload_file(&store, &input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.uri, "memory://test-container/TestFile.xml");
        assert_eq!(output.source_file, source.display().to_string());

        let content = store
            .download_content("test-container", "TestFile.xml")
            .await
            .unwrap();
        assert_eq!(content.data.as_ref(), b"<root/>");
        assert!(content.content_type.as_deref().unwrap().contains("xml"));
        assert_eq!(content.content_encoding.as_deref(), Some("utf-8"));
    }

    #[tokio::test]
    async fn renames_and_compresses() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "data.txt", "compress me").await;
        let store = MemoryProvider::new();

        let input = UploadInput {
            blob_name: Some("renamed.txt.gz".into()),
            compress: true,
            content_type: Some("application/gzip".into()),
            ..UploadInput::new(&source, "box")
        };
        let output = upload_file(&store, &input, &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.uri.ends_with("/renamed.txt.gz"));

        let content = store.download_content("box", "renamed.txt.gz").await.unwrap();
        assert!(content.is_gzip());
        assert_eq!(content.content_type.as_deref(), Some("application/gzip"));
        assert_eq!(gunzip(&content.data).unwrap(), b"compress me");
    }

    #[tokio::test]
    async fn missing_source_fails_before_store_calls() {
        let store = MemoryProvider::new();
        let input = UploadInput::new("/definitely/not/here.txt", "box");

        let err = upload_file(&store, &input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!store.container_exists("box").await.unwrap());
    }

    #[tokio::test]
    async fn unsupported_encoding_fails() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "a.txt", "x").await;
        let store = MemoryProvider::new();

        let input = UploadInput {
            treat_as_text: true,
            encoding: "utf-7".into(),
            ..UploadInput::new(&source, "box")
        };
        let err = upload_file(&store, &input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[tokio::test]
    async fn existing_blob_without_overwrite_fails() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "a.txt", "x").await;
        let store = MemoryProvider::new();
        let cancel = CancellationToken::new();

        let input = UploadInput {
            overwrite: false,
            ..UploadInput::new(&source, "box")
        };
        upload_file(&store, &input, &cancel).await.unwrap();
        let err = upload_file(&store, &input, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("upload_file"));

        let overwrite = UploadInput::new(&source, "box");
        upload_file(&store, &overwrite, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn missing_container_without_create_fails() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "a.txt", "x").await;
        let store = MemoryProvider::new();

        let input = UploadInput {
            create_container: false,
            ..UploadInput::new(&source, "absent")
        };
        let err = upload_file(&store, &input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "a.txt", "x").await;
        let store = MemoryProvider::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = upload_file(&store, &UploadInput::new(&source, "box"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn deserializes_with_defaults() {
        let input: UploadInput = serde_json::from_str(
            r#"{"sourceFile": "/tmp/a.txt", "container": "box", "renameTo": "b.txt"}"#,
        )
        .unwrap();
        assert_eq!(input.blob_name.as_deref(), Some("b.txt"));
        assert!(input.overwrite);
        assert!(input.create_container);
        assert_eq!(input.encoding, "utf-8");
        assert_eq!(input.blob_kind, BlobKind::Block);
    }
}
