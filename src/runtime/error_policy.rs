//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::bucket::BucketError;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::BackupBucket;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handle reconciliation errors with per-bucket Fibonacci backoff
///
/// Errors retrying cannot fix (an invalid spec) wait the maximum backoff.
pub fn handle_reconciliation_error(
    bucket: Arc<BackupBucket>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = bucket.name_any();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        bucket.name = name.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    if matches!(error.bucket_error(), Some(BucketError::Cancelled { .. })) {
        info!("Reconciliation of {} cancelled by shutdown", name);
        return Action::await_change();
    }

    error!("Reconciliation error for {}: {:?}", name, error);
    metrics::increment_reconciliation_errors();

    let retryable = error.is_retryable();
    let (delay, error_count) = ctx.backoff.next_backoff(&name, retryable);
    let reason = requeue_reason(retryable);

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));
    info!(
        "🔄 Retrying {} in {}s (error count: {}, trigger source: {})",
        name,
        delay.as_secs(),
        error_count,
        reason
    );
    info!(
        "📅 Next retry scheduled: {} (trigger source: {})",
        next_trigger_time.to_rfc3339(),
        reason
    );

    metrics::increment_requeues(reason);
    Action::requeue(delay)
}

#[must_use]
pub fn requeue_reason(retryable: bool) -> &'static str {
    if retryable {
        "error-backoff"
    } else {
        "invalid-configuration"
    }
}

/// Classification of controller stream errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// Reconcile failures, already handled by `handle_reconciliation_error`
    Reconcile,
    NotFound,
    Unauthorized,
    /// Resource version expired; the watcher relists
    Expired,
    /// API server storage reinitializing
    TooManyRequests,
    Other,
}

/// Classify a controller stream error by its rendered message
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 before 401: a plain-text 404 surfaces as a serde error mentioning WatchFailed
    if error_string.contains("ReconcilerFailed") {
        WatchErrorKind::Reconcile
    } else if error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found")
    {
        WatchErrorKind::NotFound
    } else if error_string.contains("401") || error_string.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::TooManyRequests
    } else {
        WatchErrorKind::Other
    }
}

/// Log a controller stream error
///
/// The watcher itself retries with backoff, so nothing here blocks the stream.
pub fn handle_watch_stream_error(error_string: &str) -> WatchErrorKind {
    let kind = classify_watch_error(error_string);
    match kind {
        WatchErrorKind::Reconcile => {}
        WatchErrorKind::NotFound => {
            warn!(
                "BackupBucket not found (404) - normal if the bucket was deleted, otherwise check that the CRD is installed. Error: {}",
                error_string
            );
        }
        WatchErrorKind::Unauthorized => {
            error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("   Verify: kubectl auth can-i list backupbuckets --as=system:serviceaccount:<namespace>:backup-bucket-controller");
        }
        WatchErrorKind::Expired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
        }
        WatchErrorKind::TooManyRequests => {
            warn!("API server storage reinitializing (429), watcher will back off");
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
        }
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_error() {
        assert_eq!(
            classify_watch_error("ReconcilerFailed(Bucket(..), ObjectRef)"),
            WatchErrorKind::Reconcile
        );
        assert_eq!(
            classify_watch_error("ObjectNotFound(ObjectRef { name: \"backups\" })"),
            WatchErrorKind::NotFound
        );
        assert_eq!(
            classify_watch_error("WatchFailed: invalid type: integer `404`"),
            WatchErrorKind::NotFound
        );
        assert_eq!(
            classify_watch_error("Api(ErrorResponse { code: 401, reason: \"Unauthorized\" })"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            classify_watch_error("WatchError: too old resource version"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            classify_watch_error("storage is (re)initializing"),
            WatchErrorKind::TooManyRequests
        );
        assert_eq!(classify_watch_error("connection reset"), WatchErrorKind::Other);
    }

    #[test]
    fn test_requeue_reason() {
        assert_eq!(requeue_reason(true), "error-backoff");
        assert_eq!(requeue_reason(false), "invalid-configuration");
    }
}
