//! Azure Blob Storage provider using the Azure SDK crates.

use std::path::Path;
use std::sync::Arc;

use azure_core::StatusCode;
use azure_core::error::ErrorKind as AzureErrorKind;
use azure_core::request_options::{Delimiter, IfMatchCondition};
use azure_identity::ClientSecretCredential;
use azure_storage::{CloudLocation, ConnectionString, StorageCredentials};
use azure_storage_blobs::blob::{BlobBlockType, BlobType, BlockList};
use azure_storage_blobs::container::operations::BlobItem;
use azure_storage_blobs::prelude::{
    BA512Range, BlobClient, BlobServiceClient, ClientBuilder, DeleteSnapshotsMethod, Tags,
};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::{AzureConfig, ConnectionMethod, OAuthConnection, Provider};
use crate::store::{
    BackendListItem, BlobContent, BlobProperties, BlobStore, DeleteBlobOptions, ListStream,
    UploadOptions,
};
use crate::transform::TransformedStream;
use crate::types::{BlobKind, SnapshotDeleteOption};
use crate::{Error, Result, TRACING_TARGET_STORE};

/// Largest block accepted by `Put Block` and `Append Block` in one request.
const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Page blobs are written in 512-byte pages.
const PAGE_SIZE: usize = 512;

/// Authority host of the Azure public cloud.
const AZURE_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Blob endpoint of the local storage emulator.
const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Azure Blob Storage-backed blob store.
#[derive(Clone)]
pub struct AzureProvider {
    service: BlobServiceClient,
    endpoint: String,
}

impl std::fmt::Debug for AzureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureProvider")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AzureProvider {
    fn builder(config: &AzureConfig) -> Result<(ClientBuilder, String)> {
        config.validate()?;

        match config.connection_method {
            ConnectionMethod::ConnectionString => {
                let value = config.connection_string.as_deref().unwrap_or_default();
                Self::from_connection_string(value)
            }
            ConnectionMethod::AccessToken => {
                let account = config.storage_account_name.clone().unwrap_or_default();
                let token = config.access_token.clone().unwrap_or_default();
                let credentials = StorageCredentials::bearer_token(token);
                Ok((
                    ClientBuilder::new(account.clone(), credentials),
                    public_endpoint(&account),
                ))
            }
            ConnectionMethod::OAuth2 => {
                let oauth = config.oauth.clone().unwrap_or_default();
                Self::from_oauth(oauth)
            }
        }
    }

    fn from_connection_string(value: &str) -> Result<(ClientBuilder, String)> {
        let connection_string = ConnectionString::new(value).map_err(|e| {
            Error::configuration(format!("invalid connection string: {e}")).with_source(e)
        })?;

        if connection_string.use_development_storage == Some(true) {
            return Ok((ClientBuilder::emulator(), EMULATOR_BLOB_ENDPOINT.to_owned()));
        }

        let credentials = connection_string.storage_credentials().map_err(|e| {
            Error::configuration(format!("invalid connection string credentials: {e}"))
                .with_source(e)
        })?;
        let account = connection_string.account_name.unwrap_or_default().to_owned();

        match connection_string.blob_endpoint {
            Some(uri) => {
                let endpoint = uri.trim_end_matches('/').to_owned();
                let location = CloudLocation::Custom {
                    account,
                    uri: endpoint.clone(),
                };
                Ok((ClientBuilder::with_location(location, credentials), endpoint))
            }
            None if !account.is_empty() => Ok((
                ClientBuilder::new(account.clone(), credentials),
                public_endpoint(&account),
            )),
            None => Err(Error::configuration(
                "connection string has neither AccountName nor BlobEndpoint",
            )),
        }
    }

    fn from_oauth(oauth: OAuthConnection) -> Result<(ClientBuilder, String)> {
        let authority = url::Url::parse(AZURE_AUTHORITY_HOST)
            .map_err(|e| Error::configuration("invalid authority host").with_source(e))?;
        let credential = ClientSecretCredential::new(
            azure_core::new_http_client(),
            authority,
            oauth.tenant_id,
            oauth.application_id,
            oauth.client_secret,
        );
        let credentials = StorageCredentials::token_credential(Arc::new(credential));
        let account = oauth.storage_account_name;

        Ok((
            ClientBuilder::new(account.clone(), credentials),
            public_endpoint(&account),
        ))
    }

    fn blob_client(&self, container: &str, blob: &str) -> BlobClient {
        self.service.container_client(container).blob_client(blob)
    }

    async fn upload_block_blob(
        &self,
        client: &BlobClient,
        body: TransformedStream,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let parallel = options.parallel_operations.max(1);
        let block_ids: Vec<String> = body
            .into_chunks(BLOCK_SIZE)
            .enumerate()
            .map(|(index, chunk)| async move {
                if cancel.is_cancelled() {
                    return Err(Error::cancelled());
                }
                let block_id = format!("{index:08}");
                client
                    .put_block(block_id.clone(), chunk?)
                    .await
                    .map_err(from_azure)?;
                Ok(block_id)
            })
            .buffered(parallel)
            .try_collect()
            .await?;

        let block_list = BlockList {
            blocks: block_ids
                .into_iter()
                .map(BlobBlockType::new_uncommitted)
                .collect(),
        };

        let mut request = client
            .put_block_list(block_list)
            .content_type(options.content_type.clone())
            .tags(tags(options));
        if let Some(encoding) = &options.content_encoding {
            request = request.content_encoding(encoding.clone());
        }
        request.await.map_err(from_azure)?;
        Ok(())
    }

    async fn upload_append_blob(
        &self,
        client: &BlobClient,
        body: TransformedStream,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut request = client
            .put_append_blob()
            .content_type(options.content_type.clone())
            .tags(tags(options));
        if let Some(encoding) = &options.content_encoding {
            request = request.content_encoding(encoding.clone());
        }
        request.await.map_err(from_azure)?;

        let mut chunks = body.into_chunks(BLOCK_SIZE);
        while let Some(chunk) = chunks.next().await {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            client.append_block(chunk?).await.map_err(from_azure)?;
        }
        Ok(())
    }

    async fn upload_page_blob(
        &self,
        client: &BlobClient,
        body: TransformedStream,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut data = BytesMut::from(body.into_bytes().await?.as_ref());
        let padded = data.len().div_ceil(PAGE_SIZE) * PAGE_SIZE;
        data.resize(padded, 0);
        let data = data.freeze();

        let mut request = client
            .put_page_blob(padded as u128)
            .content_type(options.content_type.clone())
            .tags(tags(options));
        if let Some(encoding) = &options.content_encoding {
            request = request.content_encoding(encoding.clone());
        }
        request.await.map_err(from_azure)?;

        for start in (0..padded).step_by(BLOCK_SIZE) {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            let end = (start + BLOCK_SIZE).min(padded);
            let range = BA512Range::new(start as u64, end as u64 - 1).map_err(from_azure)?;
            client
                .put_page(range, data.slice(start..end))
                .await
                .map_err(from_azure)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Provider for AzureProvider {
    type Config = AzureConfig;

    const ID: &'static str = "azure";

    async fn connect(config: &Self::Config) -> Result<Self> {
        let (builder, endpoint) = Self::builder(config)?;
        tracing::info!(
            target: TRACING_TARGET_STORE,
            endpoint = %endpoint,
            method = %config.connection_method,
            "connected to azure blob storage"
        );

        Ok(Self {
            service: builder.blob_service_client(),
            endpoint,
        })
    }
}

#[async_trait::async_trait]
impl BlobStore for AzureProvider {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn container_uri(&self, container: &str) -> String {
        format!("{}/{container}", self.endpoint)
    }

    #[tracing::instrument(name = "azure.container_exists", skip(self))]
    async fn container_exists(&self, container: &str) -> Result<bool> {
        self.service
            .container_client(container)
            .exists()
            .await
            .map_err(from_azure)
    }

    #[tracing::instrument(name = "azure.create_container", skip(self))]
    async fn create_container(&self, container: &str) -> Result<bool> {
        match self.service.container_client(container).create().await {
            Ok(_) => Ok(true),
            Err(e) if status(&e) == Some(StatusCode::Conflict) => Ok(false),
            Err(e) => Err(from_azure(e)),
        }
    }

    #[tracing::instrument(name = "azure.delete_container", skip(self))]
    async fn delete_container(&self, container: &str) -> Result<bool> {
        match self.service.container_client(container).delete().await {
            Ok(_) => Ok(true),
            Err(e) if status(&e) == Some(StatusCode::NotFound) => Ok(false),
            Err(e) => Err(from_azure(e)),
        }
    }

    #[tracing::instrument(name = "azure.exists", skip(self))]
    async fn exists(&self, container: &str, blob: &str) -> Result<bool> {
        self.blob_client(container, blob)
            .exists()
            .await
            .map_err(from_azure)
    }

    #[tracing::instrument(
        name = "azure.upload_stream",
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
        let client = self.blob_client(container, blob);
        if !options.overwrite && client.exists().await.map_err(from_azure)? {
            return Err(Error::backend(format!(
                "blob {blob} already exists in container {container}"
            )));
        }

        match options.kind {
            BlobKind::Block => self.upload_block_blob(&client, body, options, cancel).await?,
            BlobKind::Append => self.upload_append_blob(&client, body, options, cancel).await?,
            BlobKind::Page => self.upload_page_blob(&client, body, options, cancel).await?,
        }

        tracing::debug!(target: TRACING_TARGET_STORE, container, blob, "uploaded blob");
        Ok(self.blob_uri(container, blob))
    }

    #[tracing::instrument(
        name = "azure.download_to_path",
        skip(self, destination, cancel),
        fields(destination = %destination.display())
    )]
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
        let client = self.blob_client(container, blob);
        let mut pages = client.get().into_stream();

        // The destination is only touched once the first page arrived.
        let mut page = match pages.next().await {
            Some(first) => Some(first.map_err(from_azure)?),
            None => return Err(Error::not_found(format!("blob {blob} returned no content"))),
        };
        let mut file = tokio::fs::File::create(destination).await?;
        let mut properties = BlobProperties::default();

        while let Some(current) = page {
            properties.content_type = Some(current.blob.properties.content_type.clone());
            properties.content_encoding = current.blob.properties.content_encoding.clone();
            properties.etag = Some(current.blob.properties.etag.to_string());

            let mut data = current.data;
            while let Some(chunk) = data.next().await {
                if cancel.is_cancelled() {
                    drop(file);
                    tokio::fs::remove_file(destination).await?;
                    return Err(Error::cancelled());
                }
                let chunk = chunk.map_err(from_azure)?;
                properties.size += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            page = pages.next().await.transpose().map_err(from_azure)?;
        }
        file.flush().await?;

        Ok(properties)
    }

    #[tracing::instrument(name = "azure.download_content", skip(self))]
    async fn download_content(&self, container: &str, blob: &str) -> Result<BlobContent> {
        let client = self.blob_client(container, blob);
        let mut pages = client.get().into_stream();
        let mut content = BlobContent {
            data: Bytes::new(),
            content_type: None,
            content_encoding: None,
        };
        let mut buffer = BytesMut::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(from_azure)?;
            content.content_type = Some(page.blob.properties.content_type.clone());
            content.content_encoding = page.blob.properties.content_encoding.clone();
            buffer.extend_from_slice(&page.data.collect().await.map_err(from_azure)?);
        }

        content.data = buffer.freeze();
        Ok(content)
    }

    #[tracing::instrument(name = "azure.delete_blob", skip(self, options), fields(snapshots = %options.snapshots))]
    async fn delete_blob(
        &self,
        container: &str,
        blob: &str,
        options: &DeleteBlobOptions,
    ) -> Result<bool> {
        let mut request = self.blob_client(container, blob).delete();
        match options.snapshots {
            SnapshotDeleteOption::None => {}
            SnapshotDeleteOption::IncludeSnapshots => {
                request = request.delete_snapshots_method(DeleteSnapshotsMethod::Include);
            }
            SnapshotDeleteOption::DeleteSnapshotsOnly => {
                request = request.delete_snapshots_method(DeleteSnapshotsMethod::Only);
            }
        }
        if let Some(etag) = &options.if_match {
            request = request.if_match(IfMatchCondition::Match(etag.clone()));
        }

        match request.await {
            Ok(_) => Ok(true),
            Err(e) if status(&e) == Some(StatusCode::NotFound) => Ok(false),
            Err(e) => Err(from_azure(e)),
        }
    }

    fn list_blobs<'a>(
        &'a self,
        container: &'a str,
        prefix: Option<&'a str>,
        flat: bool,
    ) -> ListStream<'a> {
        let mut request = self.service.container_client(container).list_blobs();
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            request = request.prefix(prefix.to_owned());
        }
        if !flat {
            request = request.delimiter(Delimiter::new("/"));
        }

        request
            .into_stream()
            .map_err(from_azure)
            .map_ok(move |page| {
                let items: Vec<Result<BackendListItem>> = page
                    .blobs
                    .items
                    .into_iter()
                    .map(|item| Ok(self.list_item(container, item)))
                    .collect();
                stream::iter(items)
            })
            .try_flatten()
            .boxed()
    }
}

impl AzureProvider {
    fn list_item(&self, container: &str, item: BlobItem) -> BackendListItem {
        match item {
            BlobItem::Blob(blob) => BackendListItem::Blob {
                uri: self.blob_uri(container, &blob.name),
                kind: match blob.properties.blob_type {
                    BlobType::PageBlob => BlobKind::Page,
                    BlobType::AppendBlob => BlobKind::Append,
                    _ => BlobKind::Block,
                },
                etag: Some(blob.properties.etag.to_string()),
                name: blob.name,
            },
            BlobItem::BlobPrefix(prefix) => BackendListItem::Prefix { name: prefix.name },
        }
    }
}

fn public_endpoint(account: &str) -> String {
    format!("https://{account}.blob.core.windows.net")
}

fn tags(options: &UploadOptions) -> Tags {
    let mut tags = Tags::new();
    for (key, value) in &options.tags {
        tags.insert(key.clone(), value.clone());
    }
    tags
}

fn status(err: &azure_core::Error) -> Option<StatusCode> {
    match err.kind() {
        AzureErrorKind::HttpResponse { status, .. } => Some(*status),
        _ => None,
    }
}

/// Convert an [`azure_core::Error`] into a crate [`Error`].
fn from_azure(err: azure_core::Error) -> Error {
    if status(&err) == Some(StatusCode::NotFound) {
        Error::not_found(err.to_string()).with_source(err)
    } else {
        Error::backend(err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn development_storage_uses_emulator_endpoint() {
        let (_, endpoint) =
            AzureProvider::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(endpoint, EMULATOR_BLOB_ENDPOINT);
    }

    #[test]
    fn blob_endpoint_overrides_public_cloud() {
        let (_, endpoint) = AzureProvider::from_connection_string(
            "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;\
             AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;\
             BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1/;",
        )
        .unwrap();
        assert_eq!(endpoint, "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[tokio::test]
    async fn access_token_uses_account_endpoint() {
        let config = AzureConfig::access_token("myaccount", "token");
        let store = AzureProvider::connect(&config).await.unwrap();
        assert_eq!(
            store.blob_uri("box", "a.txt"),
            "https://myaccount.blob.core.windows.net/box/a.txt"
        );
    }

    #[tokio::test]
    async fn missing_fields_fail_before_connecting() {
        let config = AzureConfig {
            connection_method: ConnectionMethod::OAuth2,
            ..Default::default()
        };
        let err = AzureProvider::connect(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn failed_download_leaves_destination_untouched() {
        let (builder, endpoint) =
            AzureProvider::from_connection_string("UseDevelopmentStorage=true").unwrap();
        let store = AzureProvider {
            service: builder
                .retry(azure_core::RetryOptions::none())
                .blob_service_client(),
            endpoint,
        };

        let dir = tempfile::TempDir::new().unwrap();
        let destination = dir.path().join("keep.txt");
        tokio::fs::write(&destination, b"local").await.unwrap();

        let container = format!("missing-{}", uuid::Uuid::new_v4());
        store
            .download_to_path(&container, "blob.txt", &destination, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"local");
    }
}
