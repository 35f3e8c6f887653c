//! Task entry points over a [`BlobStore`](crate::store::BlobStore).
//!
//! Each task validates its local inputs, calls the store and maps the result
//! into a plain output record. Store failures are wrapped once with the name
//! of the task; local validation errors are raised before any store call.

mod delete;
mod download;
mod list;
mod read;
mod upload;

use tokio_util::sync::CancellationToken;

pub use self::delete::{DeleteBlobInput, DeleteContainerInput, DeleteOutput, delete_blob, delete_container};
pub use self::download::{DestinationFile, DownloadOutput, SourceBlob, download_blob};
pub use self::list::{ListInput, ListOutput, flatten_listing, list_blobs};
pub use self::read::{ReadContentOutput, read_blob_content};
pub use self::upload::{UploadInput, UploadOutput, upload_file};
use crate::{Error, Result};

/// Fails with [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled) once `cancel` fired.
fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::cancelled())
    } else {
        Ok(())
    }
}

/// Returns `None` for blank strings.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
