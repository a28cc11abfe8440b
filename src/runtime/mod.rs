//! # Runtime
//!
//! Controller process wiring.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: kube-runtime `Controller` over `BackupBucket`
//! - `error_policy`: per-bucket backoff and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
