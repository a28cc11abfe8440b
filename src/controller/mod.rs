//! # Controller
//!
//! Core controller modules for the Backup Bucket Controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
