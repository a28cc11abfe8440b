//! # Naming
//!
//! Pure derivations keyed off the bucket name. Nothing here is persisted; every
//! reconcile recomputes the same values.

use crate::constants::{GENERATED_SECRET_PREFIX, STORAGE_ACCOUNT_HASH_CHARS, STORAGE_ACCOUNT_PREFIX};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Storage account name for a bucket: `"bkp"` + the first 15 hex characters of `sha256(name)`
///
/// The result is 18 lowercase alphanumeric characters, inside Azure's 3-24 limit.
#[must_use]
pub fn storage_account_name(bucket_name: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(bucket_name.as_bytes()));
    format!(
        "{STORAGE_ACCOUNT_PREFIX}{}",
        &digest[..STORAGE_ACCOUNT_HASH_CHARS]
    )
}

/// Whole days in a retention duration, truncated toward zero
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "Retention periods beyond i32::MAX days are clamped"
)]
pub fn whole_days(duration: Duration) -> i32 {
    let days = duration.as_secs() / 3600 / 24;
    days.min(i32::MAX as u64) as i32
}

/// Name of the generated secret holding the bucket credential
#[must_use]
pub fn generated_secret_name(bucket_name: &str) -> String {
    format!("{GENERATED_SECRET_PREFIX}{bucket_name}")
}
