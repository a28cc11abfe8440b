//! # Azure Authentication
//!
//! Credential selection for Azure Resource Manager calls.

use crate::config::{AzureAuthConfig, AzureConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use std::sync::Arc;
use tracing::{debug, info};

/// TokenCredential handing out a fixed token
/// Used against local mock Resource Manager endpoints, never against Azure
pub(crate) struct StaticTokenCredential {
    token: String,
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential").finish_non_exhaustive()
    }
}

impl StaticTokenCredential {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        use typespec_client_core::time::{Duration, OffsetDateTime};

        Ok(AccessToken::new(
            Secret::new(self.token.clone()),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}

/// Build the credential for the configured authentication method
///
/// # Errors
/// Returns an error if the identity credential cannot be created.
pub fn build_credential(config: &AzureConfig) -> Result<Arc<dyn TokenCredential>> {
    let credential: Arc<dyn TokenCredential> = match &config.auth {
        AzureAuthConfig::WorkloadIdentity { client_id } => {
            info!(
                "Using Azure Workload Identity authentication with client ID: {}",
                client_id
            );
            let options = azure_identity::WorkloadIdentityCredentialOptions {
                client_id: Some(client_id.clone()),
                ..Default::default()
            };
            WorkloadIdentityCredential::new(Some(options))
                .context("Failed to create WorkloadIdentityCredential")?
        }
        AzureAuthConfig::ManagedIdentity => {
            info!("No Azure client ID configured, using Managed Identity");
            ManagedIdentityCredential::new(None)
                .context("Failed to create ManagedIdentityCredential")?
        }
        AzureAuthConfig::StaticToken { token } => {
            debug!("Using static Azure token credential");
            Arc::new(StaticTokenCredential::new(token.clone()))
        }
    };
    Ok(credential)
}
