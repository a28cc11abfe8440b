//! # Immutability Policy Engine
//!
//! Drives a container's immutability policy toward the desired state.
//!
//! The observed policy is fetched fresh on every reconcile and compared with the
//! desired one by [`plan`], a pure function. [`reconcile_immutability`] then
//! applies the planned action. A locked policy is a one-way ratchet: it may be
//! extended, but it is never shortened, unlocked or deleted.

use crate::bucket::error::BucketError;
use crate::bucket::request::{BucketRequest, ImmutabilityConfig};
use crate::observability::metrics;
use crate::provider::{CloudResourceClient, ImmutabilityPolicy};
use tracing::{debug, error, info};

/// Cloud-side policy state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedPolicy {
    Absent,
    Unlocked { days: i32, etag: String },
    Locked { days: i32, etag: String },
}

impl From<ImmutabilityPolicy> for ObservedPolicy {
    fn from(policy: ImmutabilityPolicy) -> Self {
        if policy.locked {
            Self::Locked {
                days: policy.retention_days,
                etag: policy.etag,
            }
        } else {
            Self::Unlocked {
                days: policy.retention_days,
                etag: policy.etag,
            }
        }
    }
}

/// What to do to move the observed policy toward the desired one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    None,
    Create {
        days: i32,
    },
    /// Create, re-fetch the fresh etag, then lock
    CreateAndLock {
        days: i32,
    },
    Update {
        days: i32,
        etag: String,
    },
    Delete {
        etag: String,
    },
    /// Optionally update an unlocked policy, then lock it in a separate call
    Lock {
        update_to: Option<i32>,
        etag: String,
    },
    Extend {
        days: i32,
        etag: String,
    },
}

impl PolicyAction {
    /// Metric label; `None` has no mutation to count
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Create { .. } => Some("create"),
            Self::CreateAndLock { .. } => Some("create_and_lock"),
            Self::Update { .. } => Some("update"),
            Self::Delete { .. } => Some("delete"),
            Self::Lock { .. } => Some("lock"),
            Self::Extend { .. } => Some("extend"),
        }
    }
}

/// Compare observed and desired policy and decide the single action to take
#[must_use]
pub fn plan(observed: &ObservedPolicy, desired: Option<&ImmutabilityConfig>) -> PolicyAction {
    match (observed, desired) {
        (ObservedPolicy::Absent, None) => PolicyAction::None,
        (ObservedPolicy::Absent, Some(desired)) => {
            let days = desired.retention_days();
            if desired.locked {
                PolicyAction::CreateAndLock { days }
            } else {
                PolicyAction::Create { days }
            }
        }
        (ObservedPolicy::Unlocked { etag, .. }, None) => PolicyAction::Delete {
            etag: etag.clone(),
        },
        (ObservedPolicy::Unlocked { days, etag }, Some(desired)) => {
            let target = desired.retention_days();
            if desired.locked {
                PolicyAction::Lock {
                    update_to: (target != *days).then_some(target),
                    etag: etag.clone(),
                }
            } else if target != *days {
                PolicyAction::Update {
                    days: target,
                    etag: etag.clone(),
                }
            } else {
                PolicyAction::None
            }
        }
        // Locked policies only ever grow, whatever the desired lock flag says.
        (ObservedPolicy::Locked { days, etag }, Some(desired))
            if desired.retention_days() > *days =>
        {
            PolicyAction::Extend {
                days: desired.retention_days(),
                etag: etag.clone(),
            }
        }
        (ObservedPolicy::Locked { .. }, _) => PolicyAction::None,
    }
}

/// Fetch the current policy of a container; `NotFound` means no policy
pub async fn fetch_observed(
    cloud: &dyn CloudResourceClient,
    group: &str,
    account: &str,
    container: &str,
) -> Result<ObservedPolicy, BucketError> {
    match cloud
        .get_immutability_policy(group, account, container)
        .await
    {
        Ok(policy) => Ok(policy.into()),
        Err(e) if e.is_not_found() => Ok(ObservedPolicy::Absent),
        Err(e) => Err(e.into()),
    }
}

/// Reconcile the bucket container's immutability policy and return the action taken
pub async fn reconcile_immutability(
    cloud: &dyn CloudResourceClient,
    req: &BucketRequest,
) -> Result<PolicyAction, BucketError> {
    let account = req.storage_account_name();
    let observed = fetch_observed(cloud, &req.name, &account, &req.name).await?;
    let action = plan(&observed, req.immutability.as_ref());

    if action == PolicyAction::None {
        debug!(
            "Immutability policy of container {} already converged ({:?})",
            req.name, observed
        );
        return Ok(action);
    }

    info!(
        "Immutability policy of container {}: {:?} -> {:?}",
        req.name, observed, action
    );
    // Resource group and container share the bucket name.
    apply(cloud, &req.name, &account, &req.name, &action).await?;

    if let Some(operation) = action.operation() {
        metrics::increment_immutability_operations(operation);
    }
    Ok(action)
}

async fn apply(
    cloud: &dyn CloudResourceClient,
    group: &str,
    account: &str,
    container: &str,
    action: &PolicyAction,
) -> Result<(), BucketError> {
    match action {
        PolicyAction::None => {}
        PolicyAction::Create { days } => {
            cloud
                .create_or_update_immutability_policy(group, account, container, *days, None)
                .await?;
        }
        PolicyAction::CreateAndLock { days } => {
            cloud
                .create_or_update_immutability_policy(group, account, container, *days, None)
                .await?;
            let fresh = cloud
                .get_immutability_policy(group, account, container)
                .await?;
            lock(cloud, group, account, container, &fresh.etag).await?;
        }
        PolicyAction::Update { days, etag } => {
            cloud
                .create_or_update_immutability_policy(group, account, container, *days, Some(etag))
                .await?;
        }
        PolicyAction::Delete { etag } => {
            match cloud
                .delete_immutability_policy(group, account, container, etag)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!("Immutability policy of container {} already deleted", container);
                }
                Err(e) => return Err(e.into()),
            }
        }
        PolicyAction::Lock { update_to, etag } => {
            let etag = match update_to {
                Some(days) => {
                    cloud
                        .create_or_update_immutability_policy(
                            group,
                            account,
                            container,
                            *days,
                            Some(etag),
                        )
                        .await?;
                    // The lock call rejects the etag of the policy before the update.
                    cloud
                        .get_immutability_policy(group, account, container)
                        .await?
                        .etag
                }
                None => etag.clone(),
            };
            lock(cloud, group, account, container, &etag).await?;
        }
        PolicyAction::Extend { days, etag } => {
            cloud
                .extend_immutability_policy(group, account, container, *days, etag)
                .await?;
        }
    }

    Ok(())
}

async fn lock(
    cloud: &dyn CloudResourceClient,
    group: &str,
    account: &str,
    container: &str,
    etag: &str,
) -> Result<(), BucketError> {
    cloud
        .lock_immutability_policy(group, account, container, etag)
        .await
        .map_err(|e| {
            error!(
                "Failed to lock immutability policy of container {}: {}",
                container, e
            );
            BucketError::from(e)
        })?;
    info!("Locked immutability policy of container {}", container);
    Ok(())
}
