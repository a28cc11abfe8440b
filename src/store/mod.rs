//! # Stores
//!
//! Persistence seams used by the credential publisher:
//!
//! - `SecretStore`: key/value secrets addressed by name and namespace
//! - `BucketStatusWriter`: the persisted status and annotations of a bucket
//!
//! `kubernetes` provides the implementations backed by the Kubernetes API.

use crate::crd::GeneratedSecretRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod kubernetes;

pub use kubernetes::{KubeBucketStatusWriter, KubeSecretStore};

/// Secret payload, keyed by data key
pub type SecretData = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secret {0} not found")]
    NotFound(String),

    #[error("secret {0} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create a new secret; fails with `AlreadyExists` if one is present
    async fn create(&self, reference: &GeneratedSecretRef, data: &SecretData)
        -> Result<(), StoreError>;

    /// Read a secret; a missing secret is `Ok(None)`
    async fn get(&self, reference: &GeneratedSecretRef) -> Result<Option<SecretData>, StoreError>;

    /// Overwrite the data of an existing secret; fails with `NotFound` if absent
    async fn update(&self, reference: &GeneratedSecretRef, data: &SecretData)
        -> Result<(), StoreError>;

    async fn delete(&self, reference: &GeneratedSecretRef) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BucketStatusWriter: Send + Sync {
    /// Persist the generated secret pointer on the bucket's status
    async fn record_generated_secret(
        &self,
        bucket: &str,
        reference: &GeneratedSecretRef,
    ) -> anyhow::Result<()>;

    /// Remove the rotate-now signal from the bucket
    async fn clear_rotate_signal(&self, bucket: &str) -> anyhow::Result<()>;
}
