//! # Azure Storage Client
//!
//! `CloudResourceClient` over the Azure Resource Manager REST API.
//!
//! This module provides functionality to:
//! - Create and delete resource groups
//! - Create storage accounts, list and regenerate their access keys
//! - Create, inspect and delete blob containers
//! - Manage container immutability policies (create, extend, lock, delete)
//!
//! Long-running operations (HTTP 202 with `Azure-AsyncOperation` or `Location`)
//! are polled until they finish, honoring `Retry-After`.

use crate::config::AzureConfig;
use crate::observability::metrics;
use crate::provider::azure::auth::build_credential;
use crate::provider::azure::responses::{
    ArmErrorResponse, AsyncOperationStatus, ContainerBody, ImmutabilityPolicyBody,
    ImmutabilityPolicyProperties, ImmutabilityPolicyResponse, KeyPolicy, ListKeysResponse,
    RegenerateKeyBody, ResourceGroupBody, Sku, StorageAccountBody, StorageAccountProperties,
};
use crate::provider::{
    AccountKey, AccountKeySet, CloudError, CloudResourceClient, CloudResult, ImmutabilityPolicy,
};
use anyhow::Context;
use async_trait::async_trait;
use azure_core::credentials::{TokenCredential, TokenRequestOptions};
use reqwest::header::{HeaderMap, ETAG, IF_MATCH, LOCATION, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn, Instrument};

const PROVIDER: &str = "azure";
const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// Azure storage provider implementation
pub struct AzureStorageClient {
    http: Client,
    credential: Arc<dyn TokenCredential>,
    endpoint: String,
    scope: String,
    subscription_id: String,
    storage_domain: String,
    storage_sku: String,
    poll_interval: Duration,
    lro_timeout: Duration,
}

impl std::fmt::Debug for AzureStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureStorageClient")
            .field("endpoint", &self.endpoint)
            .field("subscription_id", &self.subscription_id)
            .field("storage_domain", &self.storage_domain)
            .finish_non_exhaustive()
    }
}

impl AzureStorageClient {
    /// Create a client with the credential selected by `config.auth`
    ///
    /// # Errors
    /// Returns an error if the credential or HTTP client cannot be created.
    pub fn new(config: &AzureConfig) -> anyhow::Result<Self> {
        let credential = build_credential(config)?;
        Self::with_credential(config, credential)
    }

    /// Create a client with an explicit credential
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_credential(
        config: &AzureConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> anyhow::Result<Self> {
        // Create HTTP client with rustls
        let http = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            credential,
            endpoint: config.management_endpoint(),
            scope: config.cloud.management_scope(),
            subscription_id: config.subscription_id.clone(),
            storage_domain: config.cloud.storage_domain().to_string(),
            storage_sku: config.storage_sku.clone(),
            poll_interval: config.lro_poll_interval(),
            lro_timeout: config.lro_timeout(),
        })
    }

    fn resource_group_path(&self, group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{}",
            self.endpoint, self.subscription_id, group
        )
    }

    fn storage_account_path(&self, group: &str, account: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.endpoint, self.subscription_id, group, account
        )
    }

    fn container_path(&self, group: &str, account: &str, container: &str) -> String {
        format!(
            "{}/blobServices/default/containers/{}",
            self.storage_account_path(group, account),
            container
        )
    }

    fn policy_path(&self, group: &str, account: &str, container: &str) -> String {
        format!(
            "{}/immutabilityPolicies/default",
            self.container_path(group, account, container)
        )
    }

    /// Get access token for Azure Resource Manager
    async fn get_token(&self, resource: &str) -> CloudResult<String> {
        let options = Some(TokenRequestOptions::default());
        let token = self
            .credential
            .get_token(&[self.scope.as_str()], options)
            .await
            .map_err(|e| CloudError::Unauthorized {
                resource: resource.to_string(),
                message: format!("failed to get Azure Resource Manager access token: {e}"),
            })?;
        Ok(token.token.secret().to_string())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        resource: &str,
    ) -> CloudResult<RequestBuilder> {
        let token = self.get_token(resource).await?;
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!("{} {} ({}={})", method, path, CLIENT_REQUEST_ID, request_id);
        Ok(self
            .http
            .request(method, path)
            .query(&[("api-version", api_version)])
            .header(CLIENT_REQUEST_ID, request_id)
            .bearer_auth(token))
    }

    async fn execute(&self, request: RequestBuilder, resource: &str) -> CloudResult<Response> {
        let response = request.send().await.map_err(|e| CloudError::Transport {
            resource: resource.to_string(),
            source: anyhow::Error::new(e).context("HTTP request failed"),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ArmErrorResponse>(&body)
            .map(|e| format!("{}: {}", e.error.code, e.error.message))
            .unwrap_or(body);
        Err(classify_status(status, resource, message))
    }

    /// Wait for a long-running operation started by `response` to finish
    async fn wait_for_completion(&self, response: Response, resource: &str) -> CloudResult<()> {
        let status = response.status();
        let headers = response.headers().clone();
        let async_url = header_str(&headers, AZURE_ASYNC_OPERATION);
        let location = header_str(&headers, LOCATION.as_str());

        let pending = status == StatusCode::ACCEPTED
            || (status == StatusCode::CREATED && async_url.is_some());
        if !pending {
            return Ok(());
        }

        let deadline = Instant::now() + self.lro_timeout;
        let mut delay = retry_after(&headers).unwrap_or(self.poll_interval);

        loop {
            if Instant::now() + delay > deadline {
                return Err(CloudError::Timeout {
                    resource: resource.to_string(),
                    seconds: self.lro_timeout.as_secs(),
                });
            }
            tokio::time::sleep(delay).await;

            let token = self.get_token(resource).await?;
            if let Some(url) = &async_url {
                let response = self
                    .execute(self.http.get(url).bearer_auth(token), resource)
                    .await?;
                let next = retry_after(response.headers());
                let operation: AsyncOperationStatus = read_json(response, resource).await?;
                match operation.status.as_str() {
                    "Succeeded" => return Ok(()),
                    "Failed" | "Canceled" => {
                        let detail = operation
                            .error
                            .map(|e| format!("{}: {}", e.code, e.message))
                            .unwrap_or_default();
                        return Err(CloudError::OperationFailed {
                            resource: resource.to_string(),
                            message: format!("{} {}", operation.status, detail)
                                .trim_end()
                                .to_string(),
                        });
                    }
                    other => {
                        debug!("Operation on {} still {}", resource, other);
                        delay = next.unwrap_or(self.poll_interval);
                    }
                }
            } else if let Some(url) = &location {
                let response = self
                    .execute(self.http.get(url).bearer_auth(token), resource)
                    .await?;
                if response.status() != StatusCode::ACCEPTED {
                    return Ok(());
                }
                delay = retry_after(response.headers()).unwrap_or(self.poll_interval);
            } else {
                warn!(
                    "Accepted operation on {} carries no polling URL, assuming completion",
                    resource
                );
                return Ok(());
            }
        }
    }

    /// Run one cloud operation inside a span and record its metrics
    async fn instrumented<T, F>(
        &self,
        operation: &'static str,
        resource: &str,
        fut: F,
    ) -> CloudResult<T>
    where
        F: Future<Output = CloudResult<T>>,
    {
        let span = info_span!(
            "azure.storage",
            operation = operation,
            resource = resource,
            operation.success = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
        );
        let start = Instant::now();
        let result = fut.instrument(span.clone()).await;
        let elapsed = start.elapsed();

        span.record(
            "operation.duration_ms",
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        );
        match &result {
            // A missing resource is an answer, not a failure.
            Ok(_) | Err(CloudError::NotFound { .. }) => {
                span.record("operation.success", true);
                metrics::record_provider_operation(PROVIDER, operation, elapsed.as_secs_f64());
            }
            Err(e) => {
                span.record("operation.success", false);
                metrics::increment_provider_operation_errors(PROVIDER);
                debug!("Azure operation {} on {} failed: {}", operation, resource, e);
            }
        }
        result
    }

    async fn read_key_set(
        &self,
        response: Response,
        account: &str,
        resource: &str,
    ) -> CloudResult<AccountKeySet> {
        let body: ListKeysResponse = read_json(response, resource).await?;
        let keys = body
            .keys
            .into_iter()
            .map(|key| AccountKey {
                name: key.key_name,
                value: key.value,
                creation_time: key.creation_time,
            })
            .collect();
        AccountKeySet::from_keys(account, keys)
    }

    async fn policy_call(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let response = self.execute(request, resource).await?;
        read_policy(response, resource).await
    }
}

/// Map a failed HTTP status to the cloud error taxonomy
pub(crate) fn classify_status(status: StatusCode, resource: &str, message: String) -> CloudError {
    let resource = resource.to_string();
    match status {
        StatusCode::NOT_FOUND => CloudError::NotFound { resource },
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            CloudError::PreconditionFailed { resource, message }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CloudError::Unauthorized { resource, message }
        }
        _ => CloudError::Api {
            resource,
            status: status.as_u16(),
            message,
        },
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

async fn read_json<T: DeserializeOwned>(response: Response, resource: &str) -> CloudResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CloudError::InvalidResponse {
            resource: resource.to_string(),
            message: format!("failed to decode response body: {e}"),
        })
}

async fn read_policy(response: Response, resource: &str) -> CloudResult<ImmutabilityPolicy> {
    let header_etag = header_str(response.headers(), ETAG.as_str());
    let body: ImmutabilityPolicyResponse = read_json(response, resource).await?;

    let etag = body
        .etag
        .filter(|etag| !etag.is_empty())
        .or(header_etag)
        .unwrap_or_default();
    let Some(properties) = body.properties else {
        return Err(CloudError::not_found(resource));
    };
    // A container without a policy reports an empty policy rather than a 404.
    if etag.is_empty() || properties.state.as_deref() == Some("Deleted") {
        return Err(CloudError::not_found(resource));
    }

    Ok(ImmutabilityPolicy {
        retention_days: properties
            .immutability_period_since_creation_in_days
            .unwrap_or_default(),
        locked: properties
            .state
            .as_deref()
            .is_some_and(|state| state.eq_ignore_ascii_case("Locked")),
        etag,
    })
}

fn policy_body(days: i32) -> ImmutabilityPolicyBody {
    ImmutabilityPolicyBody {
        properties: ImmutabilityPolicyProperties {
            immutability_period_since_creation_in_days: Some(days),
            state: None,
        },
    }
}

#[async_trait]
impl CloudResourceClient for AzureStorageClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn storage_domain(&self) -> &str {
        &self.storage_domain
    }

    async fn create_or_update_resource_group(&self, group: &str, region: &str) -> CloudResult<()> {
        let resource = format!("resource group {group}");
        self.instrumented("create_or_update_resource_group", &resource, async {
            let request = self
                .request(
                    Method::PUT,
                    &self.resource_group_path(group),
                    RESOURCE_GROUP_API_VERSION,
                    &resource,
                )
                .await?
                .json(&ResourceGroupBody { location: region });
            let response = self.execute(request, &resource).await?;
            self.wait_for_completion(response, &resource).await
        })
        .await
    }

    async fn delete_resource_group(&self, group: &str) -> CloudResult<()> {
        let resource = format!("resource group {group}");
        self.instrumented("delete_resource_group", &resource, async {
            let request = self
                .request(
                    Method::DELETE,
                    &self.resource_group_path(group),
                    RESOURCE_GROUP_API_VERSION,
                    &resource,
                )
                .await?;
            let response = self.execute(request, &resource).await?;
            if response.status() == StatusCode::NO_CONTENT {
                return Err(CloudError::not_found(resource.clone()));
            }
            self.wait_for_completion(response, &resource).await
        })
        .await
    }

    async fn create_or_update_storage_account(
        &self,
        group: &str,
        account: &str,
        region: &str,
        key_expiration_days: Option<i32>,
    ) -> CloudResult<()> {
        let resource = format!("storage account {account}");
        self.instrumented("create_or_update_storage_account", &resource, async {
            let body = StorageAccountBody {
                location: region,
                kind: "StorageV2",
                sku: Sku {
                    name: &self.storage_sku,
                },
                properties: StorageAccountProperties {
                    minimum_tls_version: "TLS1_2",
                    allow_blob_public_access: false,
                    supports_https_traffic_only: true,
                    key_policy: key_expiration_days.map(|days| KeyPolicy {
                        key_expiration_period_in_days: days,
                    }),
                },
            };
            let request = self
                .request(
                    Method::PUT,
                    &self.storage_account_path(group, account),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?
                .json(&body);
            let response = self.execute(request, &resource).await?;
            self.wait_for_completion(response, &resource).await
        })
        .await
    }

    async fn list_keys(&self, group: &str, account: &str) -> CloudResult<AccountKeySet> {
        let resource = format!("storage account {account}");
        self.instrumented("list_keys", &resource, async {
            let path = format!("{}/listKeys", self.storage_account_path(group, account));
            let request = self
                .request(Method::POST, &path, STORAGE_API_VERSION, &resource)
                .await?
                .body(Vec::<u8>::new());
            let response = self.execute(request, &resource).await?;
            self.read_key_set(response, account, &resource).await
        })
        .await
    }

    async fn rotate_key(
        &self,
        group: &str,
        account: &str,
        key_name: &str,
    ) -> CloudResult<AccountKeySet> {
        let resource = format!("storage account {account}");
        self.instrumented("rotate_key", &resource, async {
            let path = format!("{}/regenerateKey", self.storage_account_path(group, account));
            let request = self
                .request(Method::POST, &path, STORAGE_API_VERSION, &resource)
                .await?
                .json(&RegenerateKeyBody { key_name });
            let response = self.execute(request, &resource).await?;
            self.read_key_set(response, account, &resource).await
        })
        .await
    }

    async fn get_container(&self, group: &str, account: &str, container: &str) -> CloudResult<()> {
        let resource = format!("container {account}/{container}");
        self.instrumented("get_container", &resource, async {
            let request = self
                .request(
                    Method::GET,
                    &self.container_path(group, account, container),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?;
            self.execute(request, &resource).await?;
            Ok(())
        })
        .await
    }

    async fn create_container(
        &self,
        group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<()> {
        let resource = format!("container {account}/{container}");
        self.instrumented("create_container", &resource, async {
            let request = self
                .request(
                    Method::PUT,
                    &self.container_path(group, account, container),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?
                .json(&ContainerBody {
                    properties: serde_json::json!({}),
                });
            self.execute(request, &resource).await?;
            Ok(())
        })
        .await
    }

    async fn delete_container(
        &self,
        group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<()> {
        let resource = format!("container {account}/{container}");
        self.instrumented("delete_container", &resource, async {
            let request = self
                .request(
                    Method::DELETE,
                    &self.container_path(group, account, container),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?;
            let response = self.execute(request, &resource).await?;
            if response.status() == StatusCode::NO_CONTENT {
                return Err(CloudError::not_found(resource.clone()));
            }
            Ok(())
        })
        .await
    }

    async fn get_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let resource = format!("immutability policy of {account}/{container}");
        self.instrumented("get_immutability_policy", &resource, async {
            let request = self
                .request(
                    Method::GET,
                    &self.policy_path(group, account, container),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?;
            self.policy_call(request, &resource).await
        })
        .await
    }

    async fn create_or_update_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        days: i32,
        etag: Option<&str>,
    ) -> CloudResult<ImmutabilityPolicy> {
        let resource = format!("immutability policy of {account}/{container}");
        self.instrumented("create_or_update_immutability_policy", &resource, async {
            let mut request = self
                .request(
                    Method::PUT,
                    &self.policy_path(group, account, container),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?
                .json(&policy_body(days));
            if let Some(etag) = etag {
                request = request.header(IF_MATCH, etag);
            }
            self.policy_call(request, &resource).await
        })
        .await
    }

    async fn extend_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        days: i32,
        etag: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let resource = format!("immutability policy of {account}/{container}");
        self.instrumented("extend_immutability_policy", &resource, async {
            let path = format!("{}/extend", self.policy_path(group, account, container));
            let request = self
                .request(Method::POST, &path, STORAGE_API_VERSION, &resource)
                .await?
                .header(IF_MATCH, etag)
                .json(&policy_body(days));
            self.policy_call(request, &resource).await
        })
        .await
    }

    async fn delete_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        etag: &str,
    ) -> CloudResult<()> {
        let resource = format!("immutability policy of {account}/{container}");
        self.instrumented("delete_immutability_policy", &resource, async {
            let request = self
                .request(
                    Method::DELETE,
                    &self.policy_path(group, account, container),
                    STORAGE_API_VERSION,
                    &resource,
                )
                .await?
                .header(IF_MATCH, etag);
            self.execute(request, &resource).await?;
            Ok(())
        })
        .await
    }

    async fn lock_immutability_policy(
        &self,
        group: &str,
        account: &str,
        container: &str,
        etag: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let resource = format!("immutability policy of {account}/{container}");
        self.instrumented("lock_immutability_policy", &resource, async {
            let path = format!("{}/lock", self.policy_path(group, account, container));
            let request = self
                .request(Method::POST, &path, STORAGE_API_VERSION, &resource)
                .await?
                .header(IF_MATCH, etag)
                .body(Vec::<u8>::new());
            self.policy_call(request, &resource).await
        })
        .await
    }
}
