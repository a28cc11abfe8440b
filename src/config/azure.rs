//! # Azure Configuration
//!
//! Subscription, cloud and authentication settings for the Azure storage client.

use super::controller::{env_var_opt, env_var_or_default, env_var_or_default_str};
use crate::constants::{
    DEFAULT_LRO_POLL_INTERVAL_SECS, DEFAULT_LRO_TIMEOUT_SECS, DEFAULT_STORAGE_SKU,
};
use crate::provider::azure::AzureCloud;
use anyhow::{Context, Result};
use std::time::Duration;

/// How the controller authenticates against Azure Resource Manager
#[derive(Clone, PartialEq, Eq)]
pub enum AzureAuthConfig {
    /// Workload Identity federated with the pod's service account
    WorkloadIdentity { client_id: String },
    /// Managed Identity of the node or pod
    ManagedIdentity,
    /// Fixed bearer token; only meant for local mock endpoints
    StaticToken { token: String },
}

impl std::fmt::Debug for AzureAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkloadIdentity { client_id } => f
                .debug_struct("WorkloadIdentity")
                .field("client_id", client_id)
                .finish(),
            Self::ManagedIdentity => f.write_str("ManagedIdentity"),
            Self::StaticToken { .. } => f.write_str("StaticToken"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub subscription_id: String,
    pub cloud: AzureCloud,
    pub auth: AzureAuthConfig,
    /// SKU of newly created storage accounts
    pub storage_sku: String,
    /// Overrides the cloud's Resource Manager endpoint (mock servers)
    pub resource_manager_endpoint: Option<String>,
    pub lro_poll_interval_secs: u64,
    pub lro_timeout_secs: u64,
}

impl AzureConfig {
    /// Load Azure settings from environment variables
    ///
    /// # Errors
    /// Returns an error if `AZURE_SUBSCRIPTION_ID` is missing or `AZURE_CLOUD` is unknown.
    pub fn from_env() -> Result<Self> {
        let subscription_id = env_var_opt("AZURE_SUBSCRIPTION_ID")
            .context("AZURE_SUBSCRIPTION_ID must be set")?;
        let cloud = env_var_or_default_str("AZURE_CLOUD", "AzurePublic")
            .parse::<AzureCloud>()
            .context("Invalid AZURE_CLOUD")?;

        let auth = if let Some(token) = env_var_opt("AZURE_STATIC_TOKEN") {
            AzureAuthConfig::StaticToken { token }
        } else if let Some(client_id) = env_var_opt("AZURE_CLIENT_ID") {
            AzureAuthConfig::WorkloadIdentity { client_id }
        } else {
            AzureAuthConfig::ManagedIdentity
        };

        Ok(Self {
            subscription_id,
            cloud,
            auth,
            storage_sku: env_var_or_default_str("AZURE_STORAGE_SKU", DEFAULT_STORAGE_SKU),
            resource_manager_endpoint: env_var_opt("AZURE_RESOURCE_MANAGER_ENDPOINT"),
            lro_poll_interval_secs: env_var_or_default(
                "AZURE_LRO_POLL_INTERVAL_SECS",
                DEFAULT_LRO_POLL_INTERVAL_SECS,
            ),
            lro_timeout_secs: env_var_or_default(
                "AZURE_LRO_TIMEOUT_SECS",
                DEFAULT_LRO_TIMEOUT_SECS,
            ),
        })
    }

    /// Resource Manager endpoint in use, without trailing slash
    #[must_use]
    pub fn management_endpoint(&self) -> String {
        self.resource_manager_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.management_endpoint())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn lro_poll_interval(&self) -> Duration {
        Duration::from_secs(self.lro_poll_interval_secs)
    }

    pub fn lro_timeout(&self) -> Duration {
        Duration::from_secs(self.lro_timeout_secs)
    }
}
