//! # Reconciler
//!
//! kube-runtime glue between `BackupBucket` resources and the bucket lifecycle.
//!
//! - `types`: reconciler context, error type and per-bucket backoff state
//! - `reconcile`: finalizer-driven reconcile entry point
//! - `status`: status patches (phase, conditions, timestamps)

pub mod reconcile;
pub mod status;
pub mod types;

pub use reconcile::reconcile;
pub use types::{BackoffRegistry, BackoffState, Reconciler, ReconcilerError};
