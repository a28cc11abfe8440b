//! # Configuration
//!
//! - `controller`: controller-level settings (namespaces, intervals, logging)
//! - `azure`: Azure subscription, cloud and authentication settings

pub mod azure;
pub mod controller;

pub use azure::{AzureAuthConfig, AzureConfig};
pub use controller::ControllerConfig;
