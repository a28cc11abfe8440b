//! # Lifecycle Reconciler
//!
//! Orchestrates provisioning, credential publishing, immutability and key
//! rotation into the two entry points `reconcile` and `delete`.
//!
//! Both entry points are re-entrant. Nothing is remembered between calls
//! besides the generated secret reference; every step re-derives its state by
//! querying the cloud. Callers must serialize calls per bucket name.

use crate::bucket::credentials::{CredentialPublisher, GeneratedSecret};
use crate::bucket::error::BucketError;
use crate::bucket::immutability::{self, PolicyAction};
use crate::bucket::provisioner;
use crate::bucket::request::BucketRequest;
use crate::bucket::rotation::{self, RotationDecision};
use crate::crd::GeneratedSecretRef;
use crate::observability::metrics;
use crate::provider::CloudResourceClient;
use crate::store::{BucketStatusWriter, SecretStore};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a successful reconcile did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub generated_secret_ref: GeneratedSecretRef,
    pub immutability: PolicyAction,
    pub rotation: RotationDecision,
    /// The generated secret was rewritten with a different key
    pub credentials_republished: bool,
}

pub struct BucketLifecycle {
    cloud: Arc<dyn CloudResourceClient>,
    publisher: CredentialPublisher,
    status: Arc<dyn BucketStatusWriter>,
}

impl std::fmt::Debug for BucketLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketLifecycle")
            .field("provider", &self.cloud.provider_name())
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl BucketLifecycle {
    pub fn new(
        cloud: Arc<dyn CloudResourceClient>,
        store: Arc<dyn SecretStore>,
        status: Arc<dyn BucketStatusWriter>,
        secret_namespace: impl Into<String>,
    ) -> Self {
        Self {
            cloud,
            publisher: CredentialPublisher::new(store, Arc::clone(&status), secret_namespace),
            status,
        }
    }

    /// Read access to the published credential for downstream consumers
    #[must_use]
    pub fn publisher(&self) -> &CredentialPublisher {
        &self.publisher
    }

    /// Drive the bucket's cloud resources and generated secret toward `req`
    ///
    /// `req` is updated in place with the generated secret reference once it is
    /// persisted, and with the cleared rotate signal once that is persisted.
    ///
    /// # Errors
    /// Returns the first error encountered. Cloud errors are propagated
    /// unchanged; `InvalidConfiguration` is returned before any cloud call.
    pub async fn reconcile(
        &self,
        req: &mut BucketRequest,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, BucketError> {
        req.validate()?;

        let bucket = req.name.clone();
        let span = info_span!("bucket.reconcile", bucket.name = %bucket);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(BucketError::Cancelled { bucket }),
            result = self.run_reconcile(req).instrument(span) => result,
        }
    }

    /// Remove the bucket's cloud resources and generated secret
    ///
    /// A bucket that never got a generated secret reference was never
    /// provisioned; deleting it makes no cloud calls at all.
    ///
    /// # Errors
    /// Returns the first error other than a missing resource.
    pub async fn delete(
        &self,
        req: &BucketRequest,
        cancel: &CancellationToken,
    ) -> Result<(), BucketError> {
        let Some(reference) = req.generated_secret_ref.clone() else {
            debug!("Bucket {} was never provisioned, nothing to delete", req.name);
            return Ok(());
        };

        let bucket = req.name.clone();
        let span = info_span!("bucket.delete", bucket.name = %bucket);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(BucketError::Cancelled { bucket }),
            result = self.run_delete(req, &reference).instrument(span) => result,
        }
    }

    async fn run_reconcile(
        &self,
        req: &mut BucketRequest,
    ) -> Result<ReconcileOutcome, BucketError> {
        let cloud = self.cloud.as_ref();
        let account = req.storage_account_name();
        let domain = cloud.storage_domain().to_string();

        // 1. The reference is only persisted once the account exists.
        let reference = match req.generated_secret_ref.clone() {
            Some(reference) => reference,
            None => {
                info!("Provisioning bucket {} in {}", req.name, req.region);
                provisioner::ensure_resource_group_and_account(cloud, req).await?;
                let keys = cloud.list_keys(&req.name, &account).await?;
                self.publisher
                    .create(req, &account, &keys.newest().value, &domain)
                    .await?
            }
        };

        // 2. Load the published credential.
        let secret = match self.publisher.get(&reference).await? {
            Some(secret) => secret,
            None => {
                warn!(
                    "Generated secret {} is missing, re-provisioning bucket {}",
                    reference, req.name
                );
                provisioner::ensure_resource_group_and_account(cloud, req).await?;
                let keys = cloud.list_keys(&req.name, &account).await?;
                self.publisher
                    .recreate(&reference, &account, &keys.newest().value, &domain)
                    .await?;
                GeneratedSecret {
                    storage_account_name: account.clone(),
                    storage_key: keys.newest().value.clone(),
                    domain: domain.clone(),
                }
            }
        };

        // 3. Container.
        provisioner::ensure_container(cloud, req).await?;

        // 4. Immutability policy.
        let immutability = immutability::reconcile_immutability(cloud, req).await?;

        // 5. Key rotation on a fresh key set.
        let signal_was_set = req.rotate_now_signal;
        let keys = cloud.list_keys(&req.name, &account).await?;
        let (keys, rotation) =
            rotation::maybe_rotate(cloud, req, keys, Some(&secret.storage_key), Utc::now()).await?;

        // Anything but the newest key is stale, including a key left behind by
        // a rotation whose publish failed.
        let stale = secret.storage_key != keys.newest().value
            || secret.storage_account_name != account
            || secret.domain != domain;
        let credentials_republished = if rotation.rotated() || stale {
            if !rotation.rotated() {
                warn!(
                    "Generated secret {} is behind the newest key of storage account {}, republishing",
                    reference, account
                );
            }
            self.publisher
                .update(&reference, &account, &keys.newest().value, &domain)
                .await?;
            true
        } else {
            false
        };

        let signal_handled = matches!(
            rotation,
            RotationDecision::Rotate(_) | RotationDecision::AlreadyRotated
        );
        if signal_was_set && signal_handled {
            self.status
                .clear_rotate_signal(&req.name)
                .await
                .map_err(BucketError::Status)?;
            req.rotate_now_signal = false;
        }

        Ok(ReconcileOutcome {
            generated_secret_ref: reference,
            immutability,
            rotation,
            credentials_republished,
        })
    }

    async fn run_delete(
        &self,
        req: &BucketRequest,
        reference: &GeneratedSecretRef,
    ) -> Result<(), BucketError> {
        let cloud = self.cloud.as_ref();
        let account = req.storage_account_name();

        match cloud.delete_container(&req.name, &account, &req.name).await {
            Ok(()) => info!("Deleted container {} of account {}", req.name, account),
            Err(e) if e.is_not_found() => debug!("Container {} already deleted", req.name),
            Err(e) => return Err(e.into()),
        }

        // Removes the storage account with it.
        match cloud.delete_resource_group(&req.name).await {
            Ok(()) => info!("Deleted resource group {}", req.name),
            Err(e) if e.is_not_found() => debug!("Resource group {} already deleted", req.name),
            Err(e) => return Err(e.into()),
        }

        self.publisher.delete(reference).await?;
        metrics::increment_deletions();
        Ok(())
    }
}
