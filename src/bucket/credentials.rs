//! # Credential Publisher
//!
//! Sole writer of the generated secret that exposes the active storage key,
//! and of the pointer to it on the bucket status.

use crate::bucket::error::BucketError;
use crate::bucket::naming::generated_secret_name;
use crate::bucket::request::BucketRequest;
use crate::constants::{SECRET_KEY_DOMAIN, SECRET_KEY_STORAGE_ACCOUNT, SECRET_KEY_STORAGE_KEY};
use crate::crd::GeneratedSecretRef;
use crate::store::{BucketStatusWriter, SecretData, SecretStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Published credential for one bucket
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    pub storage_account_name: String,
    pub storage_key: String,
    pub domain: String,
}

impl std::fmt::Debug for GeneratedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSecret")
            .field("storage_account_name", &self.storage_account_name)
            .field("storage_key", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

impl GeneratedSecret {
    fn to_data(&self) -> SecretData {
        SecretData::from([
            (
                SECRET_KEY_STORAGE_ACCOUNT.to_string(),
                self.storage_account_name.clone(),
            ),
            (SECRET_KEY_STORAGE_KEY.to_string(), self.storage_key.clone()),
            (SECRET_KEY_DOMAIN.to_string(), self.domain.clone()),
        ])
    }

    fn from_data(
        reference: &GeneratedSecretRef,
        mut data: SecretData,
    ) -> Result<Self, BucketError> {
        let mut take = |key: &str| {
            data.remove(key).ok_or_else(|| BucketError::MalformedSecret {
                reference: reference.to_string(),
                message: format!("missing data key {key}"),
            })
        };
        Ok(Self {
            storage_account_name: take(SECRET_KEY_STORAGE_ACCOUNT)?,
            storage_key: take(SECRET_KEY_STORAGE_KEY)?,
            domain: take(SECRET_KEY_DOMAIN)?,
        })
    }
}

pub struct CredentialPublisher {
    store: Arc<dyn SecretStore>,
    status: Arc<dyn BucketStatusWriter>,
    namespace: String,
}

impl std::fmt::Debug for CredentialPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPublisher")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CredentialPublisher {
    pub fn new(
        store: Arc<dyn SecretStore>,
        status: Arc<dyn BucketStatusWriter>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            status,
            namespace: namespace.into(),
        }
    }

    /// Well-known location of a bucket's generated secret
    #[must_use]
    pub fn reference_for(&self, bucket: &str) -> GeneratedSecretRef {
        GeneratedSecretRef {
            name: generated_secret_name(bucket),
            namespace: self.namespace.clone(),
        }
    }

    /// Write the secret data, then persist the pointer on the bucket status
    ///
    /// An orphaned secret left by an earlier failed pointer write is overwritten,
    /// so a retry after a partial failure converges.
    pub async fn create(
        &self,
        req: &mut BucketRequest,
        storage_account: &str,
        storage_key: &str,
        domain: &str,
    ) -> Result<GeneratedSecretRef, BucketError> {
        let reference = self.reference_for(&req.name);
        self.upsert(&reference, storage_account, storage_key, domain)
            .await?;

        self.status
            .record_generated_secret(&req.name, &reference)
            .await
            .map_err(BucketError::Status)?;
        req.generated_secret_ref = Some(reference.clone());

        info!("Published generated secret {} for bucket {}", reference, req.name);
        Ok(reference)
    }

    /// Recreate a secret that vanished while its reference stayed persisted
    pub async fn recreate(
        &self,
        reference: &GeneratedSecretRef,
        storage_account: &str,
        storage_key: &str,
        domain: &str,
    ) -> Result<(), BucketError> {
        self.upsert(reference, storage_account, storage_key, domain)
            .await?;
        info!("Recreated generated secret {}", reference);
        Ok(())
    }

    async fn upsert(
        &self,
        reference: &GeneratedSecretRef,
        storage_account: &str,
        storage_key: &str,
        domain: &str,
    ) -> Result<(), BucketError> {
        let data = GeneratedSecret {
            storage_account_name: storage_account.to_string(),
            storage_key: storage_key.to_string(),
            domain: domain.to_string(),
        }
        .to_data();

        match self.store.create(reference, &data).await {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists(_)) => {
                warn!(
                    "Generated secret {} already exists without a status reference, overwriting",
                    reference
                );
                self.store
                    .update(reference, &data)
                    .await
                    .map_err(|e| BucketError::SecretStore(e.into()))
            }
            Err(e) => Err(BucketError::SecretStore(e.into())),
        }
    }

    /// Overwrite the secret data in place; the reference never changes
    pub async fn update(
        &self,
        reference: &GeneratedSecretRef,
        storage_account: &str,
        storage_key: &str,
        domain: &str,
    ) -> Result<(), BucketError> {
        let data = GeneratedSecret {
            storage_account_name: storage_account.to_string(),
            storage_key: storage_key.to_string(),
            domain: domain.to_string(),
        }
        .to_data();

        self.store
            .update(reference, &data)
            .await
            .map_err(|e| BucketError::SecretStore(e.into()))?;
        debug!("Updated generated secret {}", reference);
        Ok(())
    }

    /// Remove the secret; a secret that is already gone is fine
    pub async fn delete(&self, reference: &GeneratedSecretRef) -> Result<(), BucketError> {
        match self.store.delete(reference).await {
            Ok(()) => {
                info!("Deleted generated secret {}", reference);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                debug!("Generated secret {} already deleted", reference);
                Ok(())
            }
            Err(e) => Err(BucketError::SecretStore(e.into())),
        }
    }

    /// Load the secret; `None` means it does not exist
    pub async fn get(
        &self,
        reference: &GeneratedSecretRef,
    ) -> Result<Option<GeneratedSecret>, BucketError> {
        let data = self
            .store
            .get(reference)
            .await
            .map_err(|e| BucketError::SecretStore(e.into()))?;

        data.map(|data| GeneratedSecret::from_data(reference, data))
            .transpose()
    }
}
