//! # Status Management
//!
//! Updates BackupBucket status with reconciliation results.
//!
//! All writes are merge patches of the fields owned here, so the generated
//! secret reference persisted by the credential publisher is never clobbered.

use crate::bucket::ReconcileOutcome;
use crate::controller::reconciler::types::Reconciler;
use crate::crd::{BackupBucket, Condition};
use anyhow::{Context, Result};
use chrono::Utc;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use tracing::debug;

pub const PHASE_READY: &str = "Ready";
pub const PHASE_FAILED: &str = "Failed";
pub const PHASE_DELETING: &str = "Deleting";

/// Build the `Ready` condition for a phase
#[must_use]
pub fn ready_condition(phase: &str, message: Option<&str>) -> Condition {
    let (status, reason) = match phase {
        PHASE_READY => ("True", "ReconciliationSucceeded"),
        PHASE_FAILED => ("False", "ReconciliationFailed"),
        PHASE_DELETING => ("False", "Deleting"),
        _ => ("Unknown", "ReconciliationInProgress"),
    };
    Condition {
        r#type: "Ready".to_string(),
        status: status.to_string(),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        reason: Some(reason.to_string()),
        message: message.map(ToString::to_string),
    }
}

/// Whether writing `phase`/`message` would change anything
///
/// Skipping no-op writes avoids watch events that would retrigger reconciles.
#[must_use]
pub fn phase_unchanged(bucket: &BackupBucket, phase: &str, message: Option<&str>) -> bool {
    let status = bucket.status.as_ref();
    status.and_then(|s| s.phase.as_deref()) == Some(phase)
        && status.and_then(|s| s.message.as_deref()) == message
        && status.and_then(|s| s.observed_generation) == bucket.metadata.generation
}

async fn patch_status(ctx: &Reconciler, name: &str, status: serde_json::Value) -> Result<()> {
    let api: Api<BackupBucket> = Api::all(ctx.client.clone());
    api.patch_status(
        name,
        &PatchParams::default(),
        &Patch::Merge(serde_json::json!({ "status": status })),
    )
    .await
    .with_context(|| format!("Failed to update status for BackupBucket {name}"))?;
    Ok(())
}

/// Record a successful reconcile
///
/// # Errors
/// Returns an error if the status patch fails.
pub async fn record_ready(
    ctx: &Reconciler,
    bucket: &BackupBucket,
    outcome: &ReconcileOutcome,
) -> Result<()> {
    let name = bucket.name_any();
    let persisted_ref = bucket
        .status
        .as_ref()
        .and_then(|s| s.generated_secret_ref.as_ref());
    if phase_unchanged(bucket, PHASE_READY, None)
        && persisted_ref == Some(&outcome.generated_secret_ref)
        && !outcome.rotation.rotated()
    {
        debug!("BackupBucket {} already Ready, skipping status update", name);
        return Ok(());
    }

    let now = Utc::now().to_rfc3339();

    let mut status = serde_json::json!({
        "phase": PHASE_READY,
        "message": serde_json::Value::Null,
        "conditions": [ready_condition(PHASE_READY, None)],
        "observedGeneration": bucket.metadata.generation,
        "lastReconcileTime": now.clone(),
        "generatedSecretRef": outcome.generated_secret_ref,
    });
    if outcome.rotation.rotated() {
        status["lastKeyRotationTime"] = serde_json::Value::String(now);
    }

    patch_status(ctx, &name, status).await?;
    debug!("Updated status of BackupBucket {} to {}", name, PHASE_READY);
    Ok(())
}

/// Record a phase other than `Ready`, skipping the write when nothing changed
///
/// # Errors
/// Returns an error if the status patch fails.
pub async fn update_phase(
    ctx: &Reconciler,
    bucket: &BackupBucket,
    phase: &str,
    message: Option<&str>,
) -> Result<()> {
    let name = bucket.name_any();
    if phase_unchanged(bucket, phase, message) {
        debug!(
            "Skipping status update for {} - phase and message unchanged: phase={}",
            name, phase
        );
        return Ok(());
    }

    let status = serde_json::json!({
        "phase": phase,
        "message": message,
        "conditions": [ready_condition(phase, message)],
        "observedGeneration": bucket.metadata.generation,
        "lastReconcileTime": Utc::now().to_rfc3339(),
    });
    patch_status(ctx, &name, status).await?;
    debug!("Updated status of BackupBucket {} to {}", name, phase);
    Ok(())
}
