//! Download of a blob into a local directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{check_cancelled, non_blank};
use crate::encoding::{TextEncoding, reconcile_file_encoding};
use crate::fs::{NameResolver, sanitize_file_name};
use crate::store::BlobStore;
use crate::types::FileExistsAction;
use crate::{Error, Result, TRACING_TARGET_TASKS};

const OPERATION: &str = "download_blob";

/// The blob to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBlob {
    /// Container holding the blob.
    pub container: String,
    /// Name of the blob.
    pub blob_name: String,
    /// Requested text encoding. Empty uses the encoding stored with the blob.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl SourceBlob {
    /// Source with the default UTF-8 encoding.
    pub fn new(container: impl Into<String>, blob_name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blob_name: blob_name.into(),
            encoding: default_encoding(),
        }
    }
}

fn default_encoding() -> String {
    "utf-8".to_owned()
}

/// Where and how the downloaded file is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationFile {
    /// Existing destination directory.
    pub directory: PathBuf,
    /// Policy when the destination file exists.
    #[serde(default, alias = "fileExistsOperation")]
    pub file_exists_action: FileExistsAction,
    /// Remove characters that are invalid in file names from the blob name.
    #[serde(default)]
    pub parse_illegal_characters: bool,
}

impl DestinationFile {
    /// Destination with the default `Error` policy.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            file_exists_action: FileExistsAction::default(),
            parse_illegal_characters: false,
        }
    }
}

/// Result of [`download_blob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutput {
    /// Name of the written file.
    pub file_name: String,
    /// Destination directory.
    pub directory: String,
    /// Full path of the written file.
    pub full_path: String,
    /// Blob name, when illegal characters were removed from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
}

/// Downloads a blob into `destination`, resolving name collisions and
/// reconciling the text encoding of the written file.
#[tracing::instrument(
    name = "task.download_blob",
    skip(store, source, destination, cancel),
    fields(container = %source.container, blob = %source.blob_name)
)]
pub async fn download_blob(
    store: &dyn BlobStore,
    source: &SourceBlob,
    destination: &DestinationFile,
    cancel: &CancellationToken,
) -> Result<DownloadOutput> {
    check_cancelled(cancel)?;

    let directory = destination.directory.as_path();
    let is_dir = tokio::fs::metadata(directory)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(Error::invalid_argument(format!(
            "destination directory {} does not exist",
            directory.display()
        )));
    }

    let requested = non_blank(Some(source.encoding.as_str()))
        .map(TextEncoding::from_label)
        .transpose()?;

    let candidate = if destination.parse_illegal_characters {
        sanitize_file_name(&source.blob_name)
    } else {
        source.blob_name.clone()
    };
    if candidate.trim().is_empty() {
        return Err(Error::invalid_argument(format!(
            "blob name '{}' is not a valid file name",
            source.blob_name
        )));
    }
    let original_file_name = (candidate != source.blob_name).then(|| source.blob_name.clone());

    let file_name = match destination.file_exists_action {
        FileExistsAction::Error => {
            let path = directory.join(&candidate);
            if tokio::fs::try_exists(&path).await? {
                return Err(Error::collision(path.display()));
            }
            candidate
        }
        FileExistsAction::Rename => NameResolver::resolve(directory, &candidate).await?,
        FileExistsAction::Overwrite => candidate,
    };
    let full_path = directory.join(&file_name);

    check_cancelled(cancel)?;
    let properties = store
        .download_to_path(&source.container, &source.blob_name, &full_path, cancel)
        .await
        .map_err(|e| e.wrap_backend(OPERATION, "error occurred while downloading blob"))?;

    let stored = TextEncoding::from_content_encoding(properties.content_encoding.as_deref());
    if let Some(target) = requested.or(stored)
        && reconcile_file_encoding(&full_path, target, stored).await?
    {
        tracing::debug!(target: TRACING_TARGET_TASKS, encoding = target.name(), "re-encoded downloaded file");
    }

    tracing::info!(
        target: TRACING_TARGET_TASKS,
        path = %full_path.display(),
        size = properties.size,
        etag = ?properties.etag,
        "downloaded blob"
    );

    Ok(DownloadOutput {
        file_name,
        directory: directory.display().to_string(),
        full_path: full_path.display().to_string(),
        original_file_name,
    })
}
