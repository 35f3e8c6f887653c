//! Provider selection and Azure credentials.

use clap::{Args, ValueEnum};
use nvisy_blob::Result;
use nvisy_blob::providers::{AzureConfig, ConnectionMethod, OAuthConnection, StoreConfig};

/// Storage backend selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// In-process store, discarded when the command exits.
    #[default]
    Memory,
    /// Azure Blob Storage.
    Azure,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Azure => f.write_str("azure"),
        }
    }
}

/// Storage provider configuration.
///
/// # Environment Variables
///
/// - `NVISY_BLOB_PROVIDER` - `memory` (default) or `azure`
/// - `AZURE_CONNECTION_METHOD` - `ConnectionString` (default), `OAuth2` or `AccessToken`
/// - `AZURE_STORAGE_CONNECTION_STRING` - account connection string
/// - `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET` - OAuth2 application
/// - `AZURE_STORAGE_ACCOUNT` - storage account for OAuth2 and access tokens
/// - `AZURE_STORAGE_ACCESS_TOKEN` - bearer token
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Storage backend.
    #[arg(long, env = "NVISY_BLOB_PROVIDER", value_enum, default_value_t = ProviderKind::Memory)]
    pub provider: ProviderKind,

    /// How to authenticate against Azure.
    #[arg(long, env = "AZURE_CONNECTION_METHOD", default_value = "ConnectionString")]
    pub connection_method: ConnectionMethod,

    /// Azure storage connection string.
    #[arg(long, env = "AZURE_STORAGE_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Directory (tenant) id of the Azure AD application.
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Application (client) id of the Azure AD application.
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub application_id: Option<String>,

    /// Client secret of the Azure AD application.
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Azure storage account name.
    #[arg(long, env = "AZURE_STORAGE_ACCOUNT")]
    pub storage_account_name: Option<String>,

    /// Pre-acquired bearer token.
    #[arg(long, env = "AZURE_STORAGE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

impl StoreArgs {
    /// Builds and validates the provider configuration.
    pub fn to_store_config(&self) -> Result<StoreConfig> {
        match self.provider {
            ProviderKind::Memory => Ok(StoreConfig::Memory),
            ProviderKind::Azure => {
                let config = self.to_azure_config();
                config.validate()?;
                Ok(StoreConfig::Azure(config))
            }
        }
    }

    fn to_azure_config(&self) -> AzureConfig {
        let oauth = (self.connection_method == ConnectionMethod::OAuth2).then(|| OAuthConnection {
            application_id: self.application_id.clone().unwrap_or_default(),
            tenant_id: self.tenant_id.clone().unwrap_or_default(),
            client_secret: self.client_secret.clone().unwrap_or_default(),
            storage_account_name: self.storage_account_name.clone().unwrap_or_default(),
        });

        AzureConfig {
            connection_method: self.connection_method,
            connection_string: self.connection_string.clone(),
            oauth,
            access_token: self.access_token.clone(),
            storage_account_name: self.storage_account_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use nvisy_blob::ErrorKind;

    use super::*;

    fn args(provider: ProviderKind, connection_method: ConnectionMethod) -> StoreArgs {
        StoreArgs {
            provider,
            connection_method,
            connection_string: None,
            tenant_id: None,
            application_id: None,
            client_secret: None,
            storage_account_name: None,
            access_token: None,
        }
    }

    #[test]
    fn memory_needs_no_credentials() {
        let config = args(ProviderKind::Memory, ConnectionMethod::default())
            .to_store_config()
            .unwrap();
        assert_eq!(config, StoreConfig::Memory);
    }

    #[test]
    fn oauth_collects_application_fields() {
        let store = StoreArgs {
            tenant_id: Some("tenant".into()),
            application_id: Some("app".into()),
            client_secret: Some("secret".into()),
            storage_account_name: Some("acme".into()),
            ..args(ProviderKind::Azure, ConnectionMethod::OAuth2)
        };

        let StoreConfig::Azure(config) = store.to_store_config().unwrap() else {
            panic!("expected an azure config");
        };
        let oauth = config.oauth.unwrap();
        assert_eq!(oauth.tenant_id, "tenant");
        assert_eq!(oauth.storage_account_name, "acme");
    }

    #[test]
    fn missing_access_token_is_rejected() {
        let store = StoreArgs {
            storage_account_name: Some("acme".into()),
            ..args(ProviderKind::Azure, ConnectionMethod::AccessToken)
        };
        let err = store.to_store_config().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
