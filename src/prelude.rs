//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use backup_bucket_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Core lifecycle
pub use crate::bucket::{
    BucketError, BucketLifecycle, BucketRequest, CredentialPublisher, GeneratedSecret,
    ImmutabilityConfig, PolicyAction, ReconcileOutcome, RotationConfig, RotationDecision,
    RotationTrigger,
};

// Seams for implementing clouds and stores
pub use crate::provider::{
    AccountKey, AccountKeySet, CloudError, CloudResourceClient, CloudResult, ImmutabilityPolicy,
};
pub use crate::store::{BucketStatusWriter, SecretData, SecretStore, StoreError};

// Reconciler types
pub use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError};

// Config types
pub use crate::config::{AzureAuthConfig, AzureConfig, ControllerConfig};

pub use crate::provider::azure::{AzureCloud, AzureStorageClient};
