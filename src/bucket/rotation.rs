//! # Key Rotation Engine
//!
//! Decides whether a storage account key is due for rotation and performs it.
//!
//! A storage account always has exactly two keys. Rotation regenerates the
//! older one, so the previously newest key stays valid as the fallback while
//! consumers pick up the fresh key from the generated secret.

use crate::bucket::error::BucketError;
use crate::bucket::request::BucketRequest;
use crate::observability::metrics;
use crate::provider::{AccountKeySet, CloudResourceClient};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Why a rotation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTrigger {
    /// Newest key is older than the rotation period
    Age,
    /// Rotate-now signal on the bucket
    Signal,
}

impl RotationTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Signal => "signal",
        }
    }
}

/// Result of a rotation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// Rotation is not configured or its period is zero
    Disabled,
    NotDue,
    /// Signal is set but the published key already is the newest key
    AlreadyRotated,
    Rotate(RotationTrigger),
}

impl RotationDecision {
    #[must_use]
    pub fn rotated(self) -> bool {
        matches!(self, Self::Rotate(_))
    }
}

/// Pure rotation decision over the observed keys
///
/// An honoured signal takes precedence over age. When the signal is set and the
/// published key already equals the newest key, an earlier reconcile rotated
/// but failed to clear the signal; no new rotation is issued.
#[must_use]
pub fn decide(
    keys: &AccountKeySet,
    req: &BucketRequest,
    published_key: Option<&str>,
    now: DateTime<Utc>,
) -> RotationDecision {
    let Some(rotation) = &req.rotation else {
        return RotationDecision::Disabled;
    };
    if rotation.rotation_period.is_zero() {
        return RotationDecision::Disabled;
    }

    if req.rotate_now_signal {
        if published_key == Some(keys.newest().value.as_str()) {
            return RotationDecision::AlreadyRotated;
        }
        return RotationDecision::Rotate(RotationTrigger::Signal);
    }

    // Unknown creation time never counts as due; only the signal rotates such keys.
    let age_due = keys.newest().creation_time.is_some_and(|created| {
        chrono::Duration::from_std(rotation.rotation_period)
            .is_ok_and(|period| now.signed_duration_since(created) > period)
    });

    if age_due {
        RotationDecision::Rotate(RotationTrigger::Age)
    } else {
        RotationDecision::NotDue
    }
}

/// Rotate the older key if rotation is due and return the resulting key set
///
/// On `AlreadyRotated` the signal is cleared on `req` and the keys come back
/// unchanged. If the rotate call fails, neither the keys nor the signal are
/// touched so the next reconcile retries the same decision.
pub async fn maybe_rotate(
    cloud: &dyn CloudResourceClient,
    req: &mut BucketRequest,
    keys: AccountKeySet,
    published_key: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(AccountKeySet, RotationDecision), BucketError> {
    let decision = decide(&keys, req, published_key, now);

    match decision {
        RotationDecision::Disabled => {
            if req.rotation.is_some() {
                warn!(
                    "Key rotation for bucket {} is configured with a zero period, treating it as disabled",
                    req.name
                );
            }
            Ok((keys, decision))
        }
        RotationDecision::NotDue => {
            debug!("Key rotation for bucket {} is not due", req.name);
            Ok((keys, decision))
        }
        RotationDecision::AlreadyRotated => {
            info!(
                "Published key of bucket {} already is the newest key, skipping signalled rotation",
                req.name
            );
            req.rotate_now_signal = false;
            Ok((keys, decision))
        }
        RotationDecision::Rotate(trigger) => {
            let account = req.storage_account_name();
            let previous_newest = keys.newest().clone();
            let target = keys.older();

            info!(
                "Rotating key {} of storage account {} (trigger: {})",
                target.name,
                account,
                trigger.as_str()
            );
            let rotated = cloud.rotate_key(&req.name, &account, &target.name).await?;

            if !rotated.contains_value(&previous_newest.value) {
                warn!(
                    "Previously newest key {} of storage account {} is gone after rotation",
                    previous_newest.name, account
                );
            }
            metrics::increment_key_rotations(trigger.as_str());
            Ok((rotated, decision))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::request::RotationConfig;
    use crate::provider::AccountKey;
    use chrono::TimeZone;
    use std::time::Duration;

    const DAY: i64 = 86_400;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(100 * DAY, 0).unwrap()
    }

    fn keys(newest_age_days: Option<i64>) -> AccountKeySet {
        AccountKeySet::from_keys(
            "bkp",
            vec![
                AccountKey {
                    name: "key1".to_string(),
                    value: "old".to_string(),
                    creation_time: Some(Utc.timestamp_opt(0, 0).unwrap()),
                },
                AccountKey {
                    name: "key2".to_string(),
                    value: "new".to_string(),
                    creation_time: newest_age_days
                        .map(|age| Utc.timestamp_opt(100 * DAY - age * DAY, 0).unwrap()),
                },
            ],
        )
        .unwrap()
    }

    fn request(period_days: u64) -> BucketRequest {
        let mut req = BucketRequest::new("backups", "westeurope");
        req.rotation = Some(RotationConfig {
            rotation_period: Duration::from_secs(period_days * 86_400),
            key_expiration_period: None,
        });
        req
    }

    #[test]
    fn test_rotation_not_configured() {
        let req = BucketRequest::new("backups", "westeurope");
        assert_eq!(decide(&keys(Some(3)), &req, None, now()), RotationDecision::Disabled);
    }

    #[test]
    fn test_zero_period_disables_rotation() {
        let mut req = request(0);
        req.rotate_now_signal = true;
        assert_eq!(decide(&keys(Some(3)), &req, None, now()), RotationDecision::Disabled);
    }

    #[test]
    fn test_age_triggers_rotation() {
        assert_eq!(
            decide(&keys(Some(3)), &request(2), Some("new"), now()),
            RotationDecision::Rotate(RotationTrigger::Age)
        );
    }

    #[test]
    fn test_young_key_is_not_due() {
        assert_eq!(
            decide(&keys(Some(1)), &request(2), Some("new"), now()),
            RotationDecision::NotDue
        );
    }

    #[test]
    fn test_unknown_creation_time_is_not_due() {
        // Neither key reports a creation time.
        let keys = AccountKeySet::from_keys(
            "bkp",
            vec![
                AccountKey {
                    name: "key1".to_string(),
                    value: "a".to_string(),
                    creation_time: None,
                },
                AccountKey {
                    name: "key2".to_string(),
                    value: "b".to_string(),
                    creation_time: None,
                },
            ],
        )
        .unwrap();
        assert_eq!(decide(&keys, &request(2), None, now()), RotationDecision::NotDue);
    }

    #[test]
    fn test_signal_triggers_rotation() {
        let mut req = request(30);
        req.rotate_now_signal = true;
        assert_eq!(
            decide(&keys(Some(1)), &req, Some("old"), now()),
            RotationDecision::Rotate(RotationTrigger::Signal)
        );
    }

    #[test]
    fn test_signal_skipped_when_published_key_is_newest() {
        let mut req = request(2);
        req.rotate_now_signal = true;
        // Even an age-due key is left alone; the cleared signal lets the next
        // reconcile rotate by age.
        assert_eq!(
            decide(&keys(Some(3)), &req, Some("new"), now()),
            RotationDecision::AlreadyRotated
        );
    }

    #[test]
    fn test_trigger_labels() {
        assert_eq!(RotationTrigger::Age.as_str(), "age");
        assert_eq!(RotationTrigger::Signal.as_str(), "signal");
        assert!(RotationDecision::Rotate(RotationTrigger::Age).rotated());
        assert!(!RotationDecision::AlreadyRotated.rotated());
    }
}
