//! # Backup Bucket Controller
//!
//! Kubernetes controller that reconciles `BackupBucket` resources into Azure
//! storage accounts and blob containers.
//!
//! 1. Watches cluster-scoped `BackupBucket` resources
//! 2. Provisions the resource group, storage account and container
//! 3. Keeps the container's immutability policy in line with `spec.immutability`
//! 4. Rotates storage account keys and publishes the active key as a secret
//! 5. Tears everything down when the resource is deleted

use anyhow::Result;
use backup_bucket_controller::runtime::initialization::initialize;
use backup_bucket_controller::runtime::watch_loop::run_watch_loop;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.buckets,
        std::sync::Arc::clone(&init.reconciler),
        std::sync::Arc::clone(&init.server_state),
    )
    .await;

    // Stop the probe server too if the watch loop ended on its own
    init.reconciler.shutdown.cancel();
    if let Err(e) = init.server_handle.await {
        warn!("HTTP server task ended abnormally: {}", e);
    }

    info!("Backup Bucket Controller exited");
    Ok(())
}
