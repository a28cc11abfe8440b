//! # BackupBucket Spec
//!
//! Main CRD specification types.

use serde::{Deserialize, Serialize};

/// BackupBucket Custom Resource Definition
///
/// Declares a backup bucket: a storage account plus one blob container, with an
/// optional immutability policy and optional key rotation.
///
/// # Example
///
/// ```yaml
/// apiVersion: backup.octopilot.io/v1alpha1
/// kind: BackupBucket
/// metadata:
///   name: shoot--prod--backups
///   annotations:
///     backup.octopilot.io/rotate: "true"   # optional, forces a key rotation
/// spec:
///   region: westeurope
///   immutability:
///     retentionPeriod: 72h
///     locked: true
///   rotation:
///     rotationPeriod: 14d
///     keyExpirationPeriod: 30d
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "BackupBucket",
    group = "backup.octopilot.io",
    version = "v1alpha1",
    status = "crate::crd::BackupBucketStatus",
    shortname = "bb",
    printcolumn = r#"{"name":"Region", "type":"string", "jsonPath":".spec.region"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupBucketSpec {
    /// Cloud region of the resource group and storage account (e.g. "westeurope")
    pub region: String,
    /// Write-once-read-many retention on the container
    /// Once locked, a policy can only be extended, never shortened or removed
    #[serde(default)]
    pub immutability: Option<ImmutabilitySpec>,
    /// Storage account key rotation
    #[serde(default)]
    pub rotation: Option<RotationSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImmutabilitySpec {
    /// Retention period, truncated to whole days (e.g. "24h", "7d")
    pub retention_period: String,
    /// Lock the policy
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RotationSpec {
    /// Maximum age of the newest key before it is rotated
    /// "0s" disables rotation
    pub rotation_period: String,
    /// Key expiration policy applied to the storage account
    #[serde(default)]
    pub key_expiration_period: Option<String>,
}
