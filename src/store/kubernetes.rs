//! # Kubernetes Stores
//!
//! `SecretStore` over core/v1 Secrets and `BucketStatusWriter` over the
//! `BackupBucket` resource.

use super::{BucketStatusWriter, SecretData, SecretStore, StoreError};
use crate::constants::{FIELD_MANAGER, ROTATE_ANNOTATION};
use crate::crd::{BackupBucket, GeneratedSecretRef};
use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::debug;

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Secret store backed by Kubernetes Secrets
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, reference: &GeneratedSecretRef) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &reference.namespace)
    }
}

fn is_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == code)
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn create(
        &self,
        reference: &GeneratedSecretRef,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(reference.name.clone()),
                namespace: Some(reference.namespace.clone()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    FIELD_MANAGER.to_string(),
                )])),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };

        match self
            .api(reference)
            .create(&PostParams::default(), &secret)
            .await
        {
            Ok(_) => {
                debug!("Created secret {}", reference);
                Ok(())
            }
            Err(e) if is_status(&e, 409) => Err(StoreError::AlreadyExists(reference.to_string())),
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context(format!("Failed to create secret {reference}")),
            )),
        }
    }

    async fn get(&self, reference: &GeneratedSecretRef) -> Result<Option<SecretData>, StoreError> {
        let secret = self
            .api(reference)
            .get_opt(&reference.name)
            .await
            .with_context(|| format!("Failed to get secret {reference}"))?;

        let Some(secret) = secret else {
            return Ok(None);
        };

        let mut data = SecretData::new();
        for (key, value) in secret.data.unwrap_or_default() {
            let value = String::from_utf8(value.0)
                .with_context(|| format!("Secret {reference} key {key} is not valid UTF-8"))?;
            data.insert(key, value);
        }
        Ok(Some(data))
    }

    async fn update(
        &self,
        reference: &GeneratedSecretRef,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        // stringData is merged into data by the API server
        let patch = serde_json::json!({ "stringData": data });

        match self
            .api(reference)
            .patch(&reference.name, &PatchParams::default(), &Patch::Merge(patch))
            .await
        {
            Ok(_) => {
                debug!("Updated secret {}", reference);
                Ok(())
            }
            Err(e) if is_status(&e, 404) => Err(StoreError::NotFound(reference.to_string())),
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context(format!("Failed to update secret {reference}")),
            )),
        }
    }

    async fn delete(&self, reference: &GeneratedSecretRef) -> Result<(), StoreError> {
        match self
            .api(reference)
            .delete(&reference.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 404) => Err(StoreError::NotFound(reference.to_string())),
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context(format!("Failed to delete secret {reference}")),
            )),
        }
    }
}

/// Status writer backed by the cluster-scoped `BackupBucket` API
#[derive(Clone)]
pub struct KubeBucketStatusWriter {
    client: Client,
}

impl std::fmt::Debug for KubeBucketStatusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeBucketStatusWriter").finish_non_exhaustive()
    }
}

impl KubeBucketStatusWriter {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BucketStatusWriter for KubeBucketStatusWriter {
    async fn record_generated_secret(
        &self,
        bucket: &str,
        reference: &GeneratedSecretRef,
    ) -> anyhow::Result<()> {
        let api: Api<BackupBucket> = Api::all(self.client.clone());
        let patch = serde_json::json!({
            "status": {
                "generatedSecretRef": reference
            }
        });

        api.patch_status(bucket, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| {
                format!("Failed to record generated secret for BackupBucket {bucket}")
            })?;

        debug!("Recorded generated secret {} on BackupBucket {}", reference, bucket);
        Ok(())
    }

    async fn clear_rotate_signal(&self, bucket: &str) -> anyhow::Result<()> {
        let api: Api<BackupBucket> = Api::all(self.client.clone());
        let patch = serde_json::json!({
            "metadata": {
                "annotations": {
                    ROTATE_ANNOTATION: serde_json::Value::Null
                }
            }
        });

        api.patch(bucket, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| {
                format!("Failed to clear rotate annotation for BackupBucket {bucket}")
            })?;

        debug!("Cleared rotate annotation for BackupBucket {}", bucket);
        Ok(())
    }
}
