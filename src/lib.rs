//! Backup Bucket Controller Library
//!
//! Provisions Azure backup buckets for `BackupBucket` resources, enforces their
//! immutability policies, rotates storage account keys and publishes the active
//! key as a Kubernetes secret.
//!
//! ## Quick Start
//!
//! ```rust
//! use backup_bucket_controller::prelude::*;
//! ```
//!
//! The core lifecycle lives in [`bucket`] and talks to the cloud only through
//! [`provider::CloudResourceClient`], so it can be driven with in-memory fakes.

pub mod bucket;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod store;
