//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_CONTROLLER_NAMESPACE,
    DEFAULT_METRICS_PORT, DEFAULT_RESYNC_INTERVAL_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace where the controller is deployed
    pub controller_namespace: String,
    /// Namespace the generated bucket secrets are written to
    pub generated_secret_namespace: String,
    /// Port of the metrics and health probe server
    pub metrics_port: u16,
    /// Requeue interval after a successful reconcile (seconds)
    /// Drives age-based key rotation
    pub resync_interval_secs: u64,
    /// Fibonacci backoff bounds for failed reconciles (minutes)
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    /// Maximum concurrent reconciliations
    /// Limits how many buckets can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_namespace: DEFAULT_CONTROLLER_NAMESPACE.to_string(),
            generated_secret_namespace: DEFAULT_CONTROLLER_NAMESPACE.to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            max_concurrent_reconciliations: 10,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            log_enable_color: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let controller_namespace =
            env_var_or_default_str("POD_NAMESPACE", DEFAULT_CONTROLLER_NAMESPACE);
        Self {
            generated_secret_namespace: env_var_or_default_str(
                "GENERATED_SECRET_NAMESPACE",
                &controller_namespace,
            ),
            controller_namespace,
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                10,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", false),
        }
    }

    /// Get resync interval duration
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a non-empty environment variable
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
