//! # Types
//!
//! Core types for the reconciler.

use crate::bucket::{BucketError, BucketLifecycle};
use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Bucket(#[from] BucketError),

    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ReconcilerError>>),

    #[error("Reconciliation failed: {0:#}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

impl ReconcilerError {
    /// The bucket-level error behind this failure, if any
    #[must_use]
    pub fn bucket_error(&self) -> Option<&BucketError> {
        use kube_runtime::finalizer::Error as FinalizerError;

        match self {
            Self::Bucket(e) => Some(e),
            Self::Finalizer(e) => match e.as_ref() {
                FinalizerError::ApplyFailed(inner) | FinalizerError::CleanupFailed(inner) => {
                    inner.bucket_error()
                }
                _ => None,
            },
            Self::ReconciliationFailed(_) => None,
        }
    }

    /// Whether requeueing without a spec change can possibly succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.bucket_error().is_none_or(BucketError::is_retryable)
    }
}

/// Backoff state for a specific bucket
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Per-bucket backoff states, keyed by bucket name
#[derive(Debug)]
pub struct BackoffRegistry {
    states: Mutex<HashMap<String, BackoffState>>,
    min_minutes: u64,
    max_minutes: u64,
}

impl BackoffRegistry {
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            min_minutes,
            max_minutes,
        }
    }

    /// Record a failure for `bucket` and return the delay before the next attempt
    /// together with the bucket's consecutive error count
    ///
    /// Non-retryable failures wait the maximum backoff.
    pub fn next_backoff(&self, bucket: &str, retryable: bool) -> (Duration, u32) {
        let mut states = match self.states.lock() {
            Ok(states) => states,
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using default backoff", e);
                return (Duration::from_secs(self.min_minutes * 60), 0);
            }
        };

        let state = states
            .entry(bucket.to_string())
            .or_insert_with(|| BackoffState::new(self.min_minutes, self.max_minutes));
        state.increment_error();
        let delay = if retryable {
            state.backoff.next_backoff()
        } else {
            Duration::from_secs(self.max_minutes * 60)
        };
        (delay, state.error_count)
    }

    /// Forget the failures of `bucket`; returns whether it was backing off
    pub fn reset(&self, bucket: &str) -> bool {
        let Ok(mut states) = self.states.lock() else {
            return false;
        };
        states.remove(bucket).is_some_and(|state| state.error_count > 0)
    }
}

/// Shared context handed to every reconcile
pub struct Reconciler {
    pub client: Client,
    pub lifecycle: Arc<BucketLifecycle>,
    pub config: ControllerConfig,
    pub backoff: BackoffRegistry,
    /// Cancelled on controller shutdown; each reconcile runs under a child token
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("lifecycle", &self.lifecycle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        client: Client,
        lifecycle: Arc<BucketLifecycle>,
        config: ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            lifecycle,
            backoff: BackoffRegistry::new(config.backoff_min_minutes, config.backoff_max_minutes),
            config,
            shutdown,
        }
    }
}
