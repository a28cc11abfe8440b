//! # Azure Clouds
//!
//! Endpoints of the public and sovereign Azure clouds.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AzureCloud {
    #[default]
    AzurePublic,
    AzureChina,
    AzureUSGovernment,
}

impl AzureCloud {
    /// Azure Resource Manager endpoint, without trailing slash
    #[must_use]
    pub fn management_endpoint(self) -> &'static str {
        match self {
            Self::AzurePublic => "https://management.azure.com",
            Self::AzureChina => "https://management.chinacloudapi.cn",
            Self::AzureUSGovernment => "https://management.usgovcloudapi.net",
        }
    }

    /// Blob service domain of storage accounts in this cloud
    #[must_use]
    pub fn storage_domain(self) -> &'static str {
        match self {
            Self::AzurePublic => "blob.core.windows.net",
            Self::AzureChina => "blob.core.chinacloudapi.cn",
            Self::AzureUSGovernment => "blob.core.usgovcloudapi.net",
        }
    }

    /// OAuth scope for Resource Manager tokens
    #[must_use]
    pub fn management_scope(self) -> String {
        format!("{}/.default", self.management_endpoint())
    }
}

impl FromStr for AzureCloud {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "azurepublic" | "azurepubliccloud" | "public" => Ok(Self::AzurePublic),
            "azurechina" | "azurechinacloud" | "china" => Ok(Self::AzureChina),
            "azureusgovernment" | "azureusgovernmentcloud" | "usgovernment" => {
                Ok(Self::AzureUSGovernment)
            }
            _ => Err(anyhow::anyhow!(
                "Unknown Azure cloud '{s}' (expected AzurePublic, AzureChina or AzureUSGovernment)"
            )),
        }
    }
}

impl fmt::Display for AzureCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AzurePublic => "AzurePublic",
            Self::AzureChina => "AzureChina",
            Self::AzureUSGovernment => "AzureUSGovernment",
        };
        f.write_str(name)
    }
}
