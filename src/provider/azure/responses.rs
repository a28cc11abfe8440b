//! # Azure Resource Manager Models
//!
//! Request and response bodies of the storage resource provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ResourceGroupBody<'a> {
    pub location: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorageAccountBody<'a> {
    pub location: &'a str,
    pub kind: &'static str,
    pub sku: Sku<'a>,
    pub properties: StorageAccountProperties,
}

#[derive(Debug, Serialize)]
pub(crate) struct Sku<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorageAccountProperties {
    pub minimum_tls_version: &'static str,
    pub allow_blob_public_access: bool,
    pub supports_https_traffic_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_policy: Option<KeyPolicy>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct KeyPolicy {
    pub key_expiration_period_in_days: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegenerateKeyBody<'a> {
    pub key_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListKeysResponse {
    #[serde(default)]
    pub keys: Vec<StorageAccountKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorageAccountKey {
    pub key_name: String,
    pub value: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ContainerBody {
    pub properties: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImmutabilityPolicyBody {
    pub properties: ImmutabilityPolicyProperties,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImmutabilityPolicyProperties {
    #[serde(default)]
    pub immutability_period_since_creation_in_days: Option<i32>,
    #[serde(default, skip_serializing)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImmutabilityPolicyResponse {
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub properties: Option<ImmutabilityPolicyProperties>,
}

/// Status document behind an `Azure-AsyncOperation` URL
#[derive(Debug, Deserialize)]
pub(crate) struct AsyncOperationStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArmErrorResponse {
    pub error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
