//! Reads a blob into a string.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{SourceBlob, check_cancelled, non_blank};
use crate::encoding::TextEncoding;
use crate::store::BlobStore;
use crate::transform::gunzip;
use crate::{Result, TRACING_TARGET_TASKS};

/// Result of [`read_blob_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadContentOutput {
    /// Decoded blob content.
    pub content: String,
}

/// Downloads a blob into memory and decodes it as text.
///
/// Gzip content is inflated first. The text is decoded with the requested
/// encoding, falling back to the encoding stored with the blob and then to
/// UTF-8. A leading byte-order mark of that encoding is dropped.
#[tracing::instrument(
    name = "task.read_blob_content",
    skip(store, source, cancel),
    fields(container = %source.container, blob = %source.blob_name)
)]
pub async fn read_blob_content(
    store: &dyn BlobStore,
    source: &SourceBlob,
    cancel: &CancellationToken,
) -> Result<ReadContentOutput> {
    check_cancelled(cancel)?;
    let requested = non_blank(Some(source.encoding.as_str()))
        .map(TextEncoding::from_label)
        .transpose()?;

    let blob = store
        .download_content(&source.container, &source.blob_name)
        .await
        .map_err(|e| e.wrap_backend("read_blob_content", "error occurred while reading blob"))?;
    check_cancelled(cancel)?;

    let encoding = requested
        .or_else(|| TextEncoding::from_content_encoding(blob.content_encoding.as_deref()))
        .unwrap_or_default();

    let content = if blob.is_gzip() {
        encoding.decode_without_bom(&gunzip(&blob.data)?)
    } else {
        encoding.decode_without_bom(&blob.data)
    };

    tracing::debug!(
        target: TRACING_TARGET_TASKS,
        encoding = encoding.name(),
        gzip = blob.is_gzip(),
        chars = content.chars().count(),
        "read blob content"
    );

    Ok(ReadContentOutput { content })
}
