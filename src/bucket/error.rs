//! # Bucket Errors
//!
//! Error taxonomy for the bucket lifecycle.

use crate::provider::CloudError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BucketError {
    /// Propagated unchanged from the cloud client
    #[error(transparent)]
    Cloud(#[from] CloudError),

    /// Desired state cannot be satisfied without a spec change
    #[error("invalid configuration for bucket {bucket}: {message}")]
    InvalidConfiguration { bucket: String, message: String },

    #[error("secret store error: {0:#}")]
    SecretStore(#[source] anyhow::Error),

    #[error("failed to persist bucket status: {0:#}")]
    Status(#[source] anyhow::Error),

    #[error("generated secret {reference} is malformed: {message}")]
    MalformedSecret { reference: String, message: String },

    #[error("reconciliation of bucket {bucket} was cancelled")]
    Cancelled { bucket: String },
}

impl BucketError {
    pub fn invalid_configuration(bucket: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            bucket: bucket.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Cloud(e) if e.is_not_found())
    }

    /// Whether requeueing without a spec change can possibly succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfiguration { .. })
    }
}
