//! # Watch Loop
//!
//! Controller watch loop that monitors BackupBucket resources and triggers
//! reconciliation when changes are detected.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::BackupBucket;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::controller::Config as ControllerRunConfig;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, Instrument};

/// Run the controller watch loop until the shutdown token is cancelled
pub async fn run_watch_loop(
    buckets: Api<BackupBucket>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) {
    let shutdown = reconciler.shutdown.clone();
    let concurrency = reconciler.config.max_concurrent_reconciliations;

    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "controller.watch",
        operation = "watch_loop"
    );

    info!(
        "Starting controller watch loop (max concurrent reconciliations: {})...",
        concurrency
    );
    server_state.set_ready(true);

    Controller::new(buckets, watcher::Config::default().any_semantic())
        .with_config(ControllerRunConfig::default().concurrency(concurrency))
        .graceful_shutdown_on(shutdown.cancelled_owned())
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(bucket.name = %object.name, action = ?action, "watch.event.reconciled");
                }
                Err(e) => {
                    handle_watch_stream_error(&format!("{e:?}"));
                }
            }
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
}
