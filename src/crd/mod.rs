//! # Custom Resource Definitions
//!
//! CRD types for the Backup Bucket Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `BackupBucket` specification
//! - `status.rs` - Status types for tracking reconciliation state
//! - `duration.rs` - Duration strings used by `BackupBucketSpec`

mod duration;
mod spec;
mod status;

pub use duration::parse_duration;
pub use spec::{BackupBucket, BackupBucketSpec, ImmutabilitySpec, RotationSpec};
pub use status::{BackupBucketStatus, Condition, GeneratedSecretRef};
