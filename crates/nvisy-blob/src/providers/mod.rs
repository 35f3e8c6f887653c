//! Blob store providers and configuration-driven selection.
//!
//! [`connect`] turns a [`StoreConfig`] into a shared [`BlobStore`] handle:
//!
//! - [`MemoryProvider`]: in-process store, always available
//! - `AzureProvider`: Azure Blob Storage, behind the `azure` feature

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[cfg(feature = "azure")]
#[cfg_attr(docsrs, doc(cfg(feature = "azure")))]
mod azure;
mod memory;

#[cfg(feature = "azure")]
#[cfg_attr(docsrs, doc(cfg(feature = "azure")))]
pub use azure::AzureProvider;
pub use memory::MemoryProvider;

use crate::store::BlobStore;
use crate::{Error, Result, TRACING_TARGET_STORE};

/// Factory for connected blob store handles.
#[async_trait::async_trait]
pub trait Provider: BlobStore + Sized + 'static {
    /// Strongly-typed configuration of this provider.
    type Config: DeserializeOwned + Send + Sync;

    /// Unique identifier (e.g. "memory", "azure").
    const ID: &'static str;

    /// Creates a connected store.
    async fn connect(config: &Self::Config) -> Result<Self>;
}

/// Selects and configures the storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "camelCase")]
pub enum StoreConfig {
    /// In-process store; contents are lost when the handle is dropped.
    #[default]
    Memory,
    /// Azure Blob Storage.
    Azure(AzureConfig),
}

/// How the Azure provider authenticates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ConnectionMethod {
    /// Account connection string, including `UseDevelopmentStorage=true`.
    #[default]
    ConnectionString,
    /// Client-credentials flow of an Azure AD application.
    OAuth2,
    /// Pre-acquired bearer token.
    AccessToken,
}

/// Azure AD application used by [`ConnectionMethod::OAuth2`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConnection {
    /// Application (client) id.
    #[serde(alias = "applicationID")]
    pub application_id: String,
    /// Directory (tenant) id.
    #[serde(alias = "tenantID")]
    pub tenant_id: String,
    /// Client secret of the application.
    pub client_secret: String,
    /// Storage account to connect to.
    pub storage_account_name: String,
}

impl fmt::Debug for OAuthConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConnection")
            .field("application_id", &self.application_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"<redacted>")
            .field("storage_account_name", &self.storage_account_name)
            .finish()
    }
}

/// Connection parameters of the Azure provider.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AzureConfig {
    /// Authentication method.
    pub connection_method: ConnectionMethod,
    /// Connection string for [`ConnectionMethod::ConnectionString`].
    pub connection_string: Option<String>,
    /// Application credentials for [`ConnectionMethod::OAuth2`].
    #[serde(alias = "connection")]
    pub oauth: Option<OAuthConnection>,
    /// Bearer token for [`ConnectionMethod::AccessToken`].
    pub access_token: Option<String>,
    /// Storage account for [`ConnectionMethod::AccessToken`].
    pub storage_account_name: Option<String>,
}

impl AzureConfig {
    /// Config using a connection string.
    pub fn connection_string(connection_string: impl Into<String>) -> Self {
        Self {
            connection_method: ConnectionMethod::ConnectionString,
            connection_string: Some(connection_string.into()),
            ..Default::default()
        }
    }

    /// Config using the client-credentials flow.
    pub fn oauth(connection: OAuthConnection) -> Self {
        Self {
            connection_method: ConnectionMethod::OAuth2,
            oauth: Some(connection),
            ..Default::default()
        }
    }

    /// Config using a pre-acquired bearer token.
    pub fn access_token(
        storage_account_name: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            connection_method: ConnectionMethod::AccessToken,
            access_token: Some(access_token.into()),
            storage_account_name: Some(storage_account_name.into()),
            ..Default::default()
        }
    }

    /// Checks that the fields required by the connection method are present.
    pub fn validate(&self) -> Result<()> {
        fn required(value: Option<&str>, name: &str, method: ConnectionMethod) -> Result<()> {
            match value {
                Some(value) if !value.trim().is_empty() => Ok(()),
                _ => Err(Error::configuration(format!(
                    "{name} is required when the connection method is {method}"
                ))),
            }
        }

        let method = self.connection_method;
        match method {
            ConnectionMethod::ConnectionString => {
                required(self.connection_string.as_deref(), "connectionString", method)
            }
            ConnectionMethod::AccessToken => {
                required(self.access_token.as_deref(), "accessToken", method)?;
                required(self.storage_account_name.as_deref(), "storageAccountName", method)
            }
            ConnectionMethod::OAuth2 => {
                let oauth = self.oauth.as_ref().ok_or_else(|| {
                    Error::configuration(format!(
                        "connection is required when the connection method is {method}"
                    ))
                })?;
                required(Some(oauth.application_id.as_str()), "applicationId", method)?;
                required(Some(oauth.tenant_id.as_str()), "tenantId", method)?;
                required(Some(oauth.client_secret.as_str()), "clientSecret", method)?;
                required(Some(oauth.storage_account_name.as_str()), "storageAccountName", method)
            }
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("AzureConfig")
            .field("connection_method", &self.connection_method)
            .field("connection_string", &redacted(&self.connection_string))
            .field("oauth", &self.oauth)
            .field("access_token", &redacted(&self.access_token))
            .field("storage_account_name", &self.storage_account_name)
            .finish()
    }
}

/// Connects the backend selected by `config`.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn BlobStore>> {
    match config {
        StoreConfig::Memory => {
            tracing::debug!(target: TRACING_TARGET_STORE, provider = MemoryProvider::ID, "connecting");
            Ok(Arc::new(MemoryProvider::connect(&()).await?))
        }
        #[cfg(feature = "azure")]
        StoreConfig::Azure(azure) => {
            tracing::debug!(
                target: TRACING_TARGET_STORE,
                provider = AzureProvider::ID,
                method = %azure.connection_method,
                "connecting"
            );
            Ok(Arc::new(AzureProvider::connect(azure).await?))
        }
        #[cfg(not(feature = "azure"))]
        StoreConfig::Azure(_) => Err(Error::configuration(
            "azure support is not compiled in, enable the `azure` feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn connects_memory_store() {
        let store = connect(&StoreConfig::Memory).await.unwrap();
        assert_eq!(store.id(), "memory");
    }

    #[test]
    fn deserializes_azure_config() {
        let config: StoreConfig = serde_json::from_str(
            r#"{
                "provider": "azure",
                "connectionMethod": "OAuth2",
                "connection": {
                    "applicationID": "app",
                    "tenantID": "tenant",
                    "clientSecret": "secret",
                    "storageAccountName": "account"
                }
            }"#,
        )
        .unwrap();

        let StoreConfig::Azure(azure) = config else {
            panic!("expected azure config");
        };
        assert_eq!(azure.connection_method, ConnectionMethod::OAuth2);
        assert_eq!(azure.oauth.as_ref().unwrap().tenant_id, "tenant");
        azure.validate().unwrap();
        assert!(!format!("{azure:?}").contains("\"secret\""));
    }

    #[test]
    fn validation_names_missing_field() {
        let config = AzureConfig {
            connection_method: ConnectionMethod::AccessToken,
            storage_account_name: Some("account".into()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("accessToken"));

        AzureConfig::connection_string("UseDevelopmentStorage=true")
            .validate()
            .unwrap();
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = AzureConfig::access_token("account", "very-secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret-token"));
        assert!(debug.contains("account"));
    }
}
