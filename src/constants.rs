//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default namespace the controller runs in
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "octopilot-system";

/// Default periodic resync interval after a successful reconcile (seconds)
/// Age-based key rotation is only noticed on a reconcile, so this bounds rotation lateness
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 3600;

/// Default Fibonacci backoff bounds for failed reconciles (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default long-running operation poll interval for Azure Resource Manager (seconds)
pub const DEFAULT_LRO_POLL_INTERVAL_SECS: u64 = 5;

/// Default upper bound on waiting for an Azure long-running operation (seconds)
pub const DEFAULT_LRO_TIMEOUT_SECS: u64 = 900;

/// Default storage account SKU
pub const DEFAULT_STORAGE_SKU: &str = "Standard_LRS";

/// Storage account name prefix
pub const STORAGE_ACCOUNT_PREFIX: &str = "bkp";

/// Number of sha256 hex characters appended to the storage account prefix
pub const STORAGE_ACCOUNT_HASH_CHARS: usize = 15;

/// Generated secret name prefix, followed by the bucket name
pub const GENERATED_SECRET_PREFIX: &str = "generated-bucket-";

/// Generated secret data keys
pub const SECRET_KEY_STORAGE_ACCOUNT: &str = "storageAccount";
pub const SECRET_KEY_STORAGE_KEY: &str = "storageKey";
pub const SECRET_KEY_DOMAIN: &str = "domain";

/// Annotation that requests an immediate key rotation
pub const ROTATE_ANNOTATION: &str = "backup.octopilot.io/rotate";

/// Finalizer guarding cloud-side cleanup
pub const BUCKET_FINALIZER: &str = "backup.octopilot.io/finalizer";

/// Field manager for server-side apply and patches
pub const FIELD_MANAGER: &str = "backup-bucket-controller";
