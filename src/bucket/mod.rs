//! # Bucket Lifecycle
//!
//! Provisioning and maintenance of backup buckets: one resource group, one
//! storage account and one blob container per bucket, plus the generated
//! secret publishing the active access key.
//!
//! - `request`: desired state of a bucket
//! - `naming`: deterministic names derived from the bucket name
//! - `provisioner`: resource group, storage account and container upserts
//! - `credentials`: the generated secret and its reference
//! - `immutability`: container immutability policy engine
//! - `rotation`: storage account key rotation
//! - `lifecycle`: `reconcile` / `delete` orchestration

pub mod credentials;
pub mod error;
pub mod immutability;
pub mod lifecycle;
pub mod naming;
pub mod provisioner;
pub mod request;
pub mod rotation;

pub use credentials::{CredentialPublisher, GeneratedSecret};
pub use error::BucketError;
pub use immutability::{ObservedPolicy, PolicyAction};
pub use lifecycle::{BucketLifecycle, ReconcileOutcome};
pub use naming::storage_account_name;
pub use request::{BucketRequest, ImmutabilityConfig, RotationConfig};
pub use rotation::{RotationDecision, RotationTrigger};
