//! # Error Handling Tests
//!
//! Error classification from the cloud seam up to the controller, and the
//! backoff the error policy derives from it.

use backup_bucket_controller::bucket::BucketError;
use backup_bucket_controller::controller::reconciler::{BackoffRegistry, ReconcilerError};
use backup_bucket_controller::provider::CloudError;
use backup_bucket_controller::runtime::error_policy::{
    classify_watch_error, requeue_reason, WatchErrorKind,
};
use std::time::Duration;

fn cloud(err: CloudError) -> ReconcilerError {
    ReconcilerError::from(BucketError::from(err))
}

#[test]
fn test_cloud_errors_are_retryable() {
    let errors = vec![
        CloudError::not_found("container backups"),
        CloudError::PreconditionFailed {
            resource: "immutability policy".to_string(),
            message: "etag mismatch".to_string(),
        },
        CloudError::Unauthorized {
            resource: "storage account".to_string(),
            message: "token expired".to_string(),
        },
        CloudError::Api {
            resource: "resource group".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        },
        CloudError::Timeout {
            resource: "storage account".to_string(),
            seconds: 900,
        },
    ];

    for err in errors {
        let rendered = err.to_string();
        assert!(cloud(err).is_retryable(), "{rendered} should be retryable");
    }
}

#[test]
fn test_invalid_configuration_is_permanent() {
    let err = ReconcilerError::from(BucketError::invalid_configuration(
        "backups",
        "rotation period 30d must be shorter than key expiration period 30d",
    ));

    assert!(!err.is_retryable());
    assert_eq!(requeue_reason(err.is_retryable()), "invalid-configuration");
}

#[test]
fn test_cloud_error_message_survives_wrapping() {
    let err = cloud(CloudError::PreconditionFailed {
        resource: "immutability policy".to_string(),
        message: "etag mismatch".to_string(),
    });

    assert_eq!(
        err.to_string(),
        "precondition failed for immutability policy: etag mismatch"
    );
    assert!(matches!(
        err.bucket_error(),
        Some(BucketError::Cloud(CloudError::PreconditionFailed { .. }))
    ));
}

#[test]
fn test_glue_errors_have_no_bucket_error() {
    let err = ReconcilerError::from(anyhow::anyhow!("status patch failed"));

    assert!(err.bucket_error().is_none());
    assert!(err.is_retryable());
}

#[test]
fn test_backoff_grows_per_bucket_and_resets() {
    let registry = BackoffRegistry::new(1, 10);

    let delays: Vec<Duration> = (0..5)
        .map(|_| registry.next_backoff("backups", true).0)
        .collect();
    assert_eq!(
        delays,
        [60, 60, 120, 180, 300].map(Duration::from_secs).to_vec()
    );

    assert_eq!(registry.next_backoff("archive", true).0, Duration::from_secs(60));

    assert!(registry.reset("backups"));
    assert_eq!(registry.next_backoff("backups", true).0, Duration::from_secs(60));
}

#[test]
fn test_permanent_errors_wait_maximum_backoff() {
    let registry = BackoffRegistry::new(1, 10);

    let (delay, _) = registry.next_backoff("backups", false);

    assert_eq!(delay, Duration::from_secs(600));
}

#[test]
fn test_watch_errors_classified() {
    assert_eq!(
        classify_watch_error("Api(ErrorResponse { code: 410, reason: \"Expired\" })"),
        WatchErrorKind::Expired
    );
    assert_eq!(
        classify_watch_error("Api(ErrorResponse { code: 429, reason: \"TooManyRequests\" })"),
        WatchErrorKind::TooManyRequests
    );
}
