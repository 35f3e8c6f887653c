//! Rewrites downloaded files into the requested text encoding.

use std::path::{Path, PathBuf};

use super::TextEncoding;
use crate::{Error, Result, TRACING_TARGET_FS};

/// Re-encodes the file at `path` into `target` if its detected encoding differs.
///
/// The current encoding is sniffed from the byte-order mark. Without one the
/// file is assumed to be in `assumed`, or UTF-8 when that is `None`. The
/// rewritten file starts with the preamble of `target`, so it
/// re-detects as `target` afterwards. Returns `true` if the file was rewritten.
///
/// The swap writes a temporary file next to the original, deletes the
/// original, then moves the temporary file into place. It is not crash-atomic:
/// a crash between the delete and the move loses the file.
pub async fn reconcile_file_encoding(
    path: &Path,
    target: TextEncoding,
    assumed: Option<TextEncoding>,
) -> Result<bool> {
    let bytes = tokio::fs::read(path).await?;
    let (detected, bom_len) = match TextEncoding::detect(&bytes) {
        (_, 0) => (assumed.unwrap_or_default(), 0),
        sniffed => sniffed,
    };
    if detected.name() == target.name() {
        return Ok(false);
    }

    let text = detected.decode(&bytes[bom_len..]);
    let rewritten = target.encode_with_preamble(&text);

    let temp_path = temp_path_for(path)?;
    tokio::fs::write(&temp_path, &rewritten).await?;
    tokio::fs::remove_file(path).await?;
    tokio::fs::rename(&temp_path, path).await?;

    tracing::debug!(
        target: TRACING_TARGET_FS,
        path = %path.display(),
        from = detected.name(),
        to = target.name(),
        "rewrote file encoding"
    );

    Ok(true)
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid_argument(format!("{} is not a file", path.display())))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".encoding-tmp");
    Ok(path.with_file_name(temp_name))
}
