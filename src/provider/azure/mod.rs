//! # Azure Provider
//!
//! Azure Resource Manager implementation of `CloudResourceClient`.
//!
//! - `auth`: credential selection (Workload Identity, Managed Identity, static token)
//! - `cloud`: public and sovereign cloud endpoints
//! - `storage`: resource group, storage account, container and policy operations

pub mod auth;
pub mod cloud;
mod responses;
pub mod storage;

// Re-export for convenience
pub use cloud::AzureCloud;
pub use storage::AzureStorageClient;
