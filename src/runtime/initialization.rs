//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, shutdown signals, and Kubernetes and Azure client setup.

use crate::bucket::BucketLifecycle;
use crate::config::{AzureConfig, ControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::BackupBucket;
use crate::observability;
use crate::provider::azure::AzureStorageClient;
use crate::provider::CloudResourceClient;
use crate::store::{KubeBucketStatusWriter, KubeSecretStore};
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Everything the watch loop needs
pub struct InitializationResult {
    pub buckets: Api<BackupBucket>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub server_handle: JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
/// Returns an error if metrics registration, Azure configuration, or the
/// Kubernetes client setup fails.
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let config = ControllerConfig::from_env();
    init_tracing(&config);

    info!("Starting Backup Bucket Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());

    let server_state = Arc::new(ServerState::default());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    };

    let azure_config = AzureConfig::from_env().context("Failed to load Azure configuration")?;
    info!(
        "Using Azure cloud {} (subscription {})",
        azure_config.cloud, azure_config.subscription_id
    );
    let cloud: Arc<dyn CloudResourceClient> = Arc::new(
        AzureStorageClient::new(&azure_config).context("Failed to create Azure storage client")?,
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    // BackupBucket is cluster-scoped
    let buckets: Api<BackupBucket> = Api::all(client.clone());
    check_crd_queryable(&buckets).await;

    info!(
        "Generated secrets are written to namespace {}",
        config.generated_secret_namespace
    );
    let lifecycle = Arc::new(BucketLifecycle::new(
        cloud,
        Arc::new(KubeSecretStore::new(client.clone())),
        Arc::new(KubeBucketStatusWriter::new(client.clone())),
        config.generated_secret_namespace.clone(),
    ));
    let reconciler = Arc::new(Reconciler::new(client, lifecycle, config, shutdown));

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        buckets,
        reconciler,
        server_state,
        server_handle,
    })
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset
#[must_use]
pub fn default_filter_directive(log_level: &str) -> String {
    let level = match log_level.to_ascii_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace") => level.to_string(),
        _ => "info".to_string(),
    };
    format!("backup_bucket_controller={level},kube_runtime=warn")
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides `LOG_LEVEL`; `LOG_FORMAT=json` selects structured output.
pub fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter_directive(&config.log_level)));

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.log_enable_color)
            .try_init()
    };

    if let Err(e) = result {
        warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}

fn spawn_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Received shutdown signal, cancelling in-flight reconciliations...");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}, only SIGINT stops the controller", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Log whether the CRD is installed; the watch loop keeps retrying either way
async fn check_crd_queryable(buckets: &Api<BackupBucket>) {
    match buckets.list(&ListParams::default().limit(1)).await {
        Ok(list) => {
            info!(
                "CRD is queryable, found {} BackupBucket resource(s) on the first page",
                list.items.len()
            );
        }
        Err(e) => {
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_directive() {
        assert_eq!(
            default_filter_directive("DEBUG"),
            "backup_bucket_controller=debug,kube_runtime=warn"
        );
        assert_eq!(
            default_filter_directive("verbose"),
            "backup_bucket_controller=info,kube_runtime=warn"
        );
    }
}
