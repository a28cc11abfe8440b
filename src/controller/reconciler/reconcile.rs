//! # Reconcile
//!
//! kube-runtime entry point for `BackupBucket` resources.
//!
//! The finalizer guarantees cloud resources are released before the object
//! disappears: `Apply` drives the bucket lifecycle toward its desired state, `Cleanup`
//! tears it down.

use crate::bucket::{BucketError, BucketRequest};
use crate::constants::BUCKET_FINALIZER;
use crate::controller::reconciler::status::{self, PHASE_DELETING, PHASE_FAILED};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::BackupBucket;
use crate::observability::metrics;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event as FinalizerEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Reconcile one `BackupBucket`
///
/// # Errors
/// Returns the lifecycle or finalizer error; the error policy decides the requeue.
pub async fn reconcile(
    bucket: Arc<BackupBucket>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    metrics::increment_reconciliations();

    let api: Api<BackupBucket> = Api::all(ctx.client.clone());
    let result = finalizer(&api, BUCKET_FINALIZER, bucket, |event| async move {
        match event {
            FinalizerEvent::Apply(bucket) => apply(&bucket, &ctx).await,
            FinalizerEvent::Cleanup(bucket) => cleanup(&bucket, &ctx).await,
        }
    })
    .await
    .map_err(|e| ReconcilerError::Finalizer(Box::new(e)));

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    result
}

async fn apply(bucket: &BackupBucket, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let name = bucket.name_any();

    let mut req = match BucketRequest::from_resource(bucket) {
        Ok(req) => req,
        Err(e) => return Err(record_failure(ctx, bucket, e).await),
    };

    let cancel = ctx.shutdown.child_token();
    let outcome = match ctx.lifecycle.reconcile(&mut req, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => return Err(record_failure(ctx, bucket, e).await),
    };

    status::record_ready(ctx, bucket, &outcome).await?;

    if ctx.backoff.reset(&name) {
        info!("🔄 Backoff reset for {}, returning to the resync schedule", name);
    }

    let resync = ctx.config.resync_interval();
    info!(
        "✅ Reconciliation complete for {} (immutability: {:?}, rotation: {:?}), next resync in {}s",
        name,
        outcome.immutability,
        outcome.rotation,
        resync.as_secs()
    );
    metrics::increment_requeues("resync");
    Ok(Action::requeue(resync))
}

async fn cleanup(bucket: &BackupBucket, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let name = bucket.name_any();
    info!("Deleting BackupBucket {}", name);

    if let Err(e) = status::update_phase(ctx, bucket, PHASE_DELETING, None).await {
        warn!("Failed to mark {} as deleting: {:#}", name, e);
    }

    // Teardown only needs the name and the generated secret pointer, so a
    // spec that no longer parses must not block deletion.
    let req = BucketRequest::from_resource(bucket).unwrap_or_else(|e| {
        warn!("Deleting {} with an unparseable spec: {}", name, e);
        let mut req = BucketRequest::new(name.clone(), bucket.spec.region.clone());
        req.deletion_requested = true;
        req.generated_secret_ref = bucket
            .status
            .as_ref()
            .and_then(|status| status.generated_secret_ref.clone());
        req
    });

    let cancel = ctx.shutdown.child_token();
    if let Err(e) = ctx.lifecycle.delete(&req, &cancel).await {
        return Err(record_failure(ctx, bucket, e).await);
    }

    ctx.backoff.reset(&name);
    info!("✅ BackupBucket {} deleted", name);
    Ok(Action::await_change())
}

/// Surface a lifecycle failure on the bucket status and hand it back
async fn record_failure(
    ctx: &Reconciler,
    bucket: &BackupBucket,
    error: BucketError,
) -> ReconcilerError {
    let message = error.to_string();
    error!("Reconciliation of {} failed: {}", bucket.name_any(), message);

    if matches!(error, BucketError::Cancelled { .. }) {
        return error.into();
    }
    if let Err(e) = status::update_phase(ctx, bucket, PHASE_FAILED, Some(&message)).await {
        warn!("Failed to record failure status: {:#}", e);
    }
    error.into()
}
