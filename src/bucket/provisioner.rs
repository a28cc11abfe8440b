//! # Resource Provisioner
//!
//! Upserts the resource group and storage account backing a bucket, and makes
//! sure its blob container exists.

use crate::bucket::error::BucketError;
use crate::bucket::request::BucketRequest;
use crate::provider::CloudResourceClient;
use tracing::{debug, info};

/// Upsert the resource group at the bucket's region, then the storage account
///
/// The key expiration policy is applied when the request configures one.
/// Safe to call repeatedly with identical parameters.
pub async fn ensure_resource_group_and_account(
    cloud: &dyn CloudResourceClient,
    req: &BucketRequest,
) -> Result<(), BucketError> {
    let account = req.storage_account_name();
    let key_expiration_days = req
        .rotation
        .as_ref()
        .and_then(super::request::RotationConfig::key_expiration_days);

    cloud
        .create_or_update_resource_group(&req.name, &req.region)
        .await?;
    debug!("Resource group {} ensured in {}", req.name, req.region);

    cloud
        .create_or_update_storage_account(&req.name, &account, &req.region, key_expiration_days)
        .await?;
    info!(
        "Storage account {} ensured in resource group {} (key expiration: {:?} days)",
        account, req.name, key_expiration_days
    );

    Ok(())
}

/// Make sure the bucket's container exists, creating it on `NotFound`
///
/// Any other error from the lookup is returned unchanged.
pub async fn ensure_container(
    cloud: &dyn CloudResourceClient,
    req: &BucketRequest,
) -> Result<(), BucketError> {
    let account = req.storage_account_name();

    match cloud.get_container(&req.name, &account, &req.name).await {
        Ok(()) => {
            debug!("Container {} exists in account {}", req.name, account);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            cloud
                .create_container(&req.name, &account, &req.name)
                .await?;
            info!("Created container {} in account {}", req.name, account);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
