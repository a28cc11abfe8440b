//! # Provider Modules
//!
//! Cloud seam for the bucket lifecycle.
//!
//! Every cloud implements `CloudResourceClient`, which covers the
//! resource-group, storage-account, blob-container and immutability-policy
//! operations the lifecycle needs. The implementation is selected once at
//! construction time and injected into `BucketLifecycle`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod azure;

/// Errors returned by cloud resource clients
///
/// `NotFound` and `PreconditionFailed` are distinguishable kinds so callers can
/// recover from a missing resource or re-fetch a stale etag.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("precondition failed for {resource}: {message}")]
    PreconditionFailed { resource: String, message: String },

    #[error("not authorized to access {resource}: {message}")]
    Unauthorized { resource: String, message: String },

    #[error("cloud API error for {resource} (HTTP {status}): {message}")]
    Api {
        resource: String,
        status: u16,
        message: String,
    },

    #[error("transport error for {resource}: {source}")]
    Transport {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unexpected response for {resource}: {message}")]
    InvalidResponse { resource: String, message: String },

    /// A long-running operation finished in a failed or canceled state
    #[error("operation on {resource} failed: {message}")]
    OperationFailed { resource: String, message: String },

    #[error("operation on {resource} did not complete within {seconds}s")]
    Timeout { resource: String, seconds: u64 },
}

impl CloudError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

/// A single storage account access key
#[derive(Clone, PartialEq, Eq)]
pub struct AccountKey {
    /// Cloud-side key name used to address the key when rotating (e.g. `key1`)
    pub name: String,
    pub value: String,
    /// `None` when the cloud did not report a creation time
    pub creation_time: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKey")
            .field("name", &self.name)
            .field("value", &"***")
            .field("creation_time", &self.creation_time)
            .finish()
    }
}

/// The two access keys of a storage account, newest first
///
/// Keys without a creation time sort as the oldest. The constructor rejects
/// anything other than exactly two keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKeySet {
    keys: [AccountKey; 2],
}

impl AccountKeySet {
    /// Build a key set from whatever the cloud returned
    ///
    /// # Errors
    /// Returns `CloudError::InvalidResponse` if the cloud did not return exactly two keys.
    pub fn from_keys(account: &str, keys: Vec<AccountKey>) -> CloudResult<Self> {
        let count = keys.len();
        let mut keys: [AccountKey; 2] =
            keys.try_into()
                .map_err(|_unexpected: Vec<AccountKey>| CloudError::InvalidResponse {
                    resource: format!("storage account {account}"),
                    message: format!("expected exactly 2 access keys, got {count}"),
                })?;
        // Stable sort keeps the cloud's order for equal creation times.
        keys.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        Ok(Self { keys })
    }

    #[must_use]
    pub fn newest(&self) -> &AccountKey {
        &self.keys[0]
    }

    #[must_use]
    pub fn older(&self) -> &AccountKey {
        &self.keys[1]
    }

    #[must_use]
    pub fn contains_value(&self, value: &str) -> bool {
        self.keys.iter().any(|k| k.value == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountKey> {
        self.keys.iter()
    }
}

/// Cloud-side immutability policy of a blob container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutabilityPolicy {
    pub retention_days: i32,
    pub locked: bool,
    pub etag: String,
}

/// Cloud resource operations consumed by the bucket lifecycle
///
/// All methods are upserts or idempotent reads unless stated otherwise. A
/// missing resource is always reported as `CloudError::NotFound`.
#[async_trait]
pub trait CloudResourceClient: Send + Sync {
    /// Short provider label used in logs and metrics
    fn provider_name(&self) -> &'static str;

    /// Blob endpoint domain published alongside the credential
    fn storage_domain(&self) -> &str;

    async fn create_or_update_resource_group(&self, group: &str, region: &str) -> CloudResult<()>;

    async fn delete_resource_group(&self, group: &str) -> CloudResult<()>;

    async fn create_or_update_storage_account(
        &self,
        group: &str,
        account: &str,
        region: &str,
        key_expiration_days: Option<i32>,
    ) -> CloudResult<()>;

    async fn list_keys(&self, group: &str, account: &str) -> CloudResult<AccountKeySet>;

    /// Regenerate the named key and return the refreshed key set
    async fn rotate_key(&self, group: &str, account: &str, key_name: &str)
        -> CloudResult<AccountKeySet>;

    async fn get_container(&self, group: &str, account: &str, container: &str) -> CloudResult<()>;

    async fn create_container(&self, group: &str, account: &str, container: &str)
        -> CloudResult<()>;

    async fn delete_container(&self, group: &str, account: &str, container: &str)
        -> CloudResult<()>;

    async fn get_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<ImmutabilityPolicy>;

    /// Create or update an unlocked policy; `etag` is required when one already exists
    async fn create_or_update_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        days: i32,
        etag: Option<&str>,
    ) -> CloudResult<ImmutabilityPolicy>;

    /// Extend a locked policy to `days`
    async fn extend_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        days: i32,
        etag: &str,
    ) -> CloudResult<ImmutabilityPolicy>;

    async fn delete_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        etag: &str,
    ) -> CloudResult<()>;

    async fn lock_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        etag: &str,
    ) -> CloudResult<ImmutabilityPolicy>;
}
