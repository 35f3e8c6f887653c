//! In-process provider backed by [`object_store::memory::InMemory`].
//!
//! Every container is its own `InMemory` store. The blob kind and the blob
//! name as given by the caller are kept as metadata attributes next to the
//! content type and encoding; object paths percent-encode some characters and
//! drop empty segments, so listings report the stored name instead.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use futures::stream::{self, StreamExt, TryStreamExt};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectMeta, ObjectStore, PutMode, PutOptions, PutPayload,
    TagSet,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::Provider;
use crate::store::{
    BackendListItem, BlobContent, BlobProperties, BlobStore, DeleteBlobOptions, ListStream,
    UploadOptions,
};
use crate::transform::{DEFAULT_CHUNK_SIZE, TransformedStream};
use crate::types::{BlobKind, SnapshotDeleteOption};
use crate::{Error, Result, TRACING_TARGET_STORE};

/// Metadata attribute holding the [`BlobKind`] of a stored blob.
const BLOB_TYPE_METADATA: &str = "blob-type";

/// Metadata attribute holding the blob name as given on upload.
const BLOB_NAME_METADATA: &str = "blob-name";

/// In-memory blob store, used for tests and local dry runs.
///
/// Snapshots are not modelled: deleting with
/// [`SnapshotDeleteOption::DeleteSnapshotsOnly`] leaves the blob in place.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    containers: RwLock<HashMap<String, Arc<InMemory>>>,
}

impl MemoryProvider {
    /// Creates an empty store without containers.
    pub fn new() -> Self {
        Self::default()
    }

    async fn container(&self, container: &str) -> Result<Arc<InMemory>> {
        self.containers
            .read()
            .await
            .get(container)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("container {container} does not exist")))
    }

    /// Buffers `chunks` and stores them as `blob`, checking `cancel` before
    /// each chunk. Nothing is stored when cancelled.
    async fn upload_chunks<S>(
        &self,
        container: &str,
        blob: &str,
        mut chunks: S,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin + Send,
    {
        let store = self.container(container).await?;

        let mut buffer = Vec::new();
        while let Some(chunk) = chunks.next().await {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            buffer.extend_from_slice(&chunk?);
        }

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, options.content_type.clone().into());
        if let Some(encoding) = &options.content_encoding {
            attributes.insert(Attribute::ContentEncoding, encoding.clone().into());
        }
        attributes.insert(
            Attribute::Metadata(BLOB_TYPE_METADATA.into()),
            options.kind.to_string().into(),
        );
        attributes.insert(
            Attribute::Metadata(BLOB_NAME_METADATA.into()),
            blob.to_owned().into(),
        );

        let mut tags = TagSet::default();
        for (key, value) in &options.tags {
            tags.push(key, value);
        }

        let mode = if options.overwrite {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };
        let put = PutOptions {
            mode,
            tags,
            attributes,
            ..Default::default()
        };

        let size = buffer.len();
        store
            .put_opts(&ObjectPath::from(blob), PutPayload::from(buffer), put)
            .await
            .map_err(from_object_store)?;

        tracing::debug!(target: TRACING_TARGET_STORE, container, blob, size, "uploaded blob");
        Ok(self.blob_uri(container, blob))
    }
}

#[async_trait::async_trait]
impl Provider for MemoryProvider {
    type Config = ();

    const ID: &'static str = "memory";

    async fn connect(_config: &Self::Config) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryProvider {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn container_uri(&self, container: &str) -> String {
        format!("memory://{container}")
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(self.containers.read().await.contains_key(container))
    }

    #[tracing::instrument(name = "memory.create_container", skip(self))]
    async fn create_container(&self, container: &str) -> Result<bool> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(container.to_owned(), Arc::new(InMemory::new()));
        tracing::debug!(target: TRACING_TARGET_STORE, container, "created container");
        Ok(true)
    }

    #[tracing::instrument(name = "memory.delete_container", skip(self))]
    async fn delete_container(&self, container: &str) -> Result<bool> {
        Ok(self.containers.write().await.remove(container).is_some())
    }

    async fn exists(&self, container: &str, blob: &str) -> Result<bool> {
        let Ok(store) = self.container(container).await else {
            return Ok(false);
        };
        match store.head(&ObjectPath::from(blob)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(from_object_store(e)),
        }
    }

    #[tracing::instrument(
        name = "memory.upload_stream",
        skip(self, body, options, cancel),
        fields(kind = %options.kind, overwrite = options.overwrite)
    )]
    async fn upload_stream(
        &self,
        container: &str,
        blob: &str,
        body: TransformedStream,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.upload_chunks(container, blob, body.into_chunks(DEFAULT_CHUNK_SIZE), options, cancel)
            .await
    }

    #[tracing::instrument(name = "memory.download_to_path", skip(self, destination, cancel), fields(destination = %destination.display()))]
    async fn download_to_path(
        &self,
        container: &str,
        blob: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<BlobProperties> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        let store = self.container(container).await?;
        let result = store
            .get(&ObjectPath::from(blob))
            .await
            .map_err(from_object_store)?;

        let properties = BlobProperties {
            size: result.meta.size,
            content_type: attribute(&result.attributes, &Attribute::ContentType),
            content_encoding: attribute(&result.attributes, &Attribute::ContentEncoding),
            etag: result.meta.e_tag.clone(),
        };

        write_chunks(destination, result.into_stream(), cancel).await?;
        Ok(properties)
    }

    #[tracing::instrument(name = "memory.download_content", skip(self))]
    async fn download_content(&self, container: &str, blob: &str) -> Result<BlobContent> {
        let store = self.container(container).await?;
        let result = store
            .get(&ObjectPath::from(blob))
            .await
            .map_err(from_object_store)?;

        let content_type = attribute(&result.attributes, &Attribute::ContentType);
        let content_encoding = attribute(&result.attributes, &Attribute::ContentEncoding);
        let data = result.bytes().await.map_err(from_object_store)?;

        Ok(BlobContent {
            data,
            content_type,
            content_encoding,
        })
    }

    #[tracing::instrument(name = "memory.delete_blob", skip(self, options), fields(snapshots = %options.snapshots))]
    async fn delete_blob(
        &self,
        container: &str,
        blob: &str,
        options: &DeleteBlobOptions,
    ) -> Result<bool> {
        let store = self.container(container).await?;
        let path = ObjectPath::from(blob);

        let meta = match store.head(&path).await {
            Ok(meta) => meta,
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(from_object_store(e)),
        };

        if let Some(expected) = options.if_match.as_deref()
            && meta.e_tag.as_deref() != Some(expected)
        {
            return Err(Error::backend(format!(
                "condition not met: etag of {blob} is not {expected}"
            )));
        }

        if options.snapshots == SnapshotDeleteOption::DeleteSnapshotsOnly {
            return Ok(true);
        }

        store.delete(&path).await.map_err(from_object_store)?;
        Ok(true)
    }

    fn list_blobs<'a>(
        &'a self,
        container: &'a str,
        prefix: Option<&'a str>,
        flat: bool,
    ) -> ListStream<'a> {
        let prefix = prefix.unwrap_or_default().to_owned();

        stream::once(async move {
            let store = self.container(container).await?;
            let objects: Vec<ObjectMeta> = store
                .list(None)
                .try_collect()
                .await
                .map_err(from_object_store)?;

            let mut blobs = Vec::with_capacity(objects.len());
            for meta in objects {
                let (name, kind) = stored_blob(&store, &meta.location).await?;
                blobs.push((name, kind, meta.e_tag));
            }
            blobs.sort_by(|a, b| a.0.cmp(&b.0));

            let mut items: Vec<Result<BackendListItem>> = Vec::new();
            let mut last_directory: Option<String> = None;
            for (name, kind, etag) in blobs {
                let Some(rest) = name.strip_prefix(prefix.as_str()) else {
                    continue;
                };

                if !flat && let Some(at) = rest.find('/') {
                    let directory = format!("{prefix}{}", &rest[..=at]);
                    if last_directory.as_deref() != Some(directory.as_str()) {
                        last_directory = Some(directory.clone());
                        items.push(Ok(BackendListItem::Prefix { name: directory }));
                    }
                    continue;
                }

                items.push(Ok(BackendListItem::Blob {
                    uri: self.blob_uri(container, &name),
                    name,
                    kind,
                    etag,
                }));
            }

            tracing::debug!(
                target: TRACING_TARGET_STORE,
                container,
                prefix = %prefix,
                flat,
                count = items.len(),
                "listed blobs"
            );
            Ok::<_, Error>(stream::iter(items))
        })
        .try_flatten()
        .boxed()
    }
}

/// Reads the caller-given name and the kind stored with the object at `path`.
async fn stored_blob(store: &InMemory, path: &ObjectPath) -> Result<(String, BlobKind)> {
    let options = GetOptions {
        head: true,
        ..Default::default()
    };
    let result = store
        .get_opts(path, options)
        .await
        .map_err(from_object_store)?;
    let name = attribute(&result.attributes, &Attribute::Metadata(BLOB_NAME_METADATA.into()))
        .unwrap_or_else(|| path.to_string());
    let kind = attribute(&result.attributes, &Attribute::Metadata(BLOB_TYPE_METADATA.into()))
        .and_then(|kind| BlobKind::from_str(&kind).ok())
        .unwrap_or_default();

    Ok((name, kind))
}

/// Writes `chunks` into a new file at `destination`, checking `cancel` before
/// each chunk. A cancelled download removes the partial file.
async fn write_chunks<S>(destination: &Path, mut chunks: S, cancel: &CancellationToken) -> Result<()>
where
    S: Stream<Item = object_store::Result<Bytes>> + Unpin,
{
    let mut file = tokio::fs::File::create(destination).await?;
    while let Some(chunk) = chunks.next().await {
        if cancel.is_cancelled() {
            drop(file);
            tokio::fs::remove_file(destination).await?;
            return Err(Error::cancelled());
        }
        file.write_all(&chunk.map_err(from_object_store)?).await?;
    }
    file.flush().await?;
    Ok(())
}

fn attribute(attributes: &Attributes, key: &Attribute) -> Option<String> {
    attributes.get(key).map(|v| v.to_string())
}

/// Convert an [`object_store::Error`] into a crate [`Error`].
fn from_object_store(err: object_store::Error) -> Error {
    if matches!(err, object_store::Error::NotFound { .. }) {
        Error::not_found(err.to_string()).with_source(err)
    } else {
        Error::backend(err.to_string()).with_source(err)
    }
}
