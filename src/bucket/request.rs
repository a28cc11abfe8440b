//! # Bucket Request
//!
//! Desired state handed to the lifecycle for a single reconcile.

use crate::bucket::error::BucketError;
use crate::bucket::naming::{storage_account_name, whole_days};
use crate::constants::ROTATE_ANNOTATION;
use crate::crd::{parse_duration, BackupBucket, GeneratedSecretRef};
use std::time::Duration;

/// Desired immutability policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutabilityConfig {
    pub retention_period: Duration,
    pub locked: bool,
}

impl ImmutabilityConfig {
    #[must_use]
    pub fn retention_days(&self) -> i32 {
        whole_days(self.retention_period)
    }
}

/// Desired key rotation behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Zero disables rotation
    pub rotation_period: Duration,
    pub key_expiration_period: Option<Duration>,
}

impl RotationConfig {
    #[must_use]
    pub fn key_expiration_days(&self) -> Option<i32> {
        self.key_expiration_period.map(whole_days)
    }
}

/// Desired state of one bucket plus the persisted pointer to its generated secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRequest {
    /// Bucket name; doubles as resource group and container name
    pub name: String,
    pub region: String,
    pub immutability: Option<ImmutabilityConfig>,
    pub rotation: Option<RotationConfig>,
    pub rotate_now_signal: bool,
    pub deletion_requested: bool,
    pub generated_secret_ref: Option<GeneratedSecretRef>,
}

impl BucketRequest {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            immutability: None,
            rotation: None,
            rotate_now_signal: false,
            deletion_requested: false,
            generated_secret_ref: None,
        }
    }

    /// Build a request from a `BackupBucket` resource
    ///
    /// # Errors
    /// Returns `BucketError::InvalidConfiguration` when a duration cannot be parsed.
    pub fn from_resource(bucket: &BackupBucket) -> Result<Self, BucketError> {
        let name = bucket.metadata.name.clone().unwrap_or_default();

        let immutability = bucket
            .spec
            .immutability
            .as_ref()
            .map(|spec| -> Result<ImmutabilityConfig, BucketError> {
                Ok(ImmutabilityConfig {
                    retention_period: parse_field(
                        &name,
                        "immutability.retentionPeriod",
                        &spec.retention_period,
                    )?,
                    locked: spec.locked,
                })
            })
            .transpose()?;

        let rotation = bucket
            .spec
            .rotation
            .as_ref()
            .map(|spec| -> Result<RotationConfig, BucketError> {
                Ok(RotationConfig {
                    rotation_period: parse_field(
                        &name,
                        "rotation.rotationPeriod",
                        &spec.rotation_period,
                    )?,
                    key_expiration_period: spec
                        .key_expiration_period
                        .as_deref()
                        .map(|period| parse_field(&name, "rotation.keyExpirationPeriod", period))
                        .transpose()?,
                })
            })
            .transpose()?;

        let rotate_now_signal = bucket
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(ROTATE_ANNOTATION))
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        Ok(Self {
            name,
            region: bucket.spec.region.clone(),
            immutability,
            rotation,
            rotate_now_signal,
            deletion_requested: bucket.metadata.deletion_timestamp.is_some(),
            generated_secret_ref: bucket
                .status
                .as_ref()
                .and_then(|status| status.generated_secret_ref.clone()),
        })
    }

    /// Reference to the published credential, if the bucket was ever provisioned
    #[must_use]
    pub fn generated_secret_ref(&self) -> Option<&GeneratedSecretRef> {
        self.generated_secret_ref.as_ref()
    }

    #[must_use]
    pub fn storage_account_name(&self) -> String {
        storage_account_name(&self.name)
    }

    /// Reject desired states the cloud can never satisfy
    ///
    /// A zero rotation period is not an error; it disables rotation.
    ///
    /// # Errors
    /// Returns `BucketError::InvalidConfiguration` describing the first problem found.
    pub fn validate(&self) -> Result<(), BucketError> {
        if self.name.trim().is_empty() {
            return Err(BucketError::invalid_configuration(&self.name, "bucket name is empty"));
        }
        if self.region.trim().is_empty() {
            return Err(BucketError::invalid_configuration(&self.name, "region is empty"));
        }

        if let Some(immutability) = &self.immutability {
            if immutability.retention_days() < 1 {
                return Err(BucketError::invalid_configuration(
                    &self.name,
                    format!(
                        "immutability retention period {}s is shorter than one day",
                        immutability.retention_period.as_secs()
                    ),
                ));
            }
        }

        if let Some(rotation) = &self.rotation {
            if let Some(expiration) = rotation.key_expiration_period {
                if whole_days(expiration) < 1 {
                    return Err(BucketError::invalid_configuration(
                        &self.name,
                        format!(
                            "key expiration period {}s is shorter than one day",
                            expiration.as_secs()
                        ),
                    ));
                }
                if !rotation.rotation_period.is_zero() && rotation.rotation_period >= expiration {
                    return Err(BucketError::invalid_configuration(
                        &self.name,
                        format!(
                            "rotation period {}s must be shorter than key expiration period {}s",
                            rotation.rotation_period.as_secs(),
                            expiration.as_secs()
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn parse_field(bucket: &str, field: &str, value: &str) -> Result<Duration, BucketError> {
    parse_duration(value)
        .map_err(|e| BucketError::invalid_configuration(bucket, format!("{field}: {e}")))
}
