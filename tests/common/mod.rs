//! Common test utilities for bucket lifecycle tests
//!
//! In-memory fakes of the cloud, the secret store and the status writer, plus
//! a harness wiring them into a `BucketLifecycle`.

#![allow(dead_code, reason = "Each test binary uses a different subset of the helpers")]

use async_trait::async_trait;
use backup_bucket_controller::bucket::{
    BucketLifecycle, BucketRequest, ImmutabilityConfig, RotationConfig,
};
use backup_bucket_controller::crd::GeneratedSecretRef;
use backup_bucket_controller::provider::{
    AccountKey, AccountKeySet, CloudError, CloudResourceClient, CloudResult, ImmutabilityPolicy,
};
use backup_bucket_controller::store::{BucketStatusWriter, SecretData, SecretStore, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DOMAIN: &str = "blob.core.windows.net";
pub const SECRET_NAMESPACE: &str = "garden";

/// One call observed by the fake cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateOrUpdateResourceGroup { group: String, region: String },
    DeleteResourceGroup { group: String },
    CreateOrUpdateStorageAccount {
        account: String,
        region: String,
        key_expiration_days: Option<i32>,
    },
    ListKeys { account: String },
    RotateKey { account: String, key_name: String },
    GetContainer { container: String },
    CreateContainer { container: String },
    DeleteContainer { container: String },
    GetPolicy,
    CreateOrUpdatePolicy { days: i32, etag: Option<String> },
    ExtendPolicy { days: i32, etag: String },
    DeletePolicy { etag: String },
    LockPolicy { etag: String },
}

impl Call {
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Call::ListKeys { .. } | Call::GetContainer { .. } | Call::GetPolicy
        )
    }

    #[must_use]
    pub fn is_policy_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateOrUpdatePolicy { .. }
                | Call::ExtendPolicy { .. }
                | Call::DeletePolicy { .. }
                | Call::LockPolicy { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct FakePolicy {
    days: i32,
    locked: bool,
    etag: String,
}

impl FakePolicy {
    fn to_policy(&self) -> ImmutabilityPolicy {
        ImmutabilityPolicy {
            retention_days: self.days,
            locked: self.locked,
            etag: self.etag.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct CloudState {
    groups: HashSet<String>,
    /// account -> (group, keys)
    accounts: HashMap<String, (String, Vec<AccountKey>)>,
    /// (account, container)
    containers: HashSet<(String, String)>,
    policies: HashMap<(String, String), FakePolicy>,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
    key_generation: u64,
}

/// In-memory Azure-like cloud enforcing etags and locked-policy rules
#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<CloudState>,
}

fn new_etag() -> String {
    format!("\"{}\"", uuid::Uuid::new_v4())
}

fn injected(operation: &str) -> CloudError {
    CloudError::Api {
        resource: operation.to_string(),
        status: 500,
        message: "injected failure".to_string(),
    }
}

impl FakeCloud {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Make `operation` fail with an API error until `recover` is called
    pub fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.remove(operation);
    }

    /// Seed a storage account with two keys created `ages` ago (key1, key2)
    pub fn seed_account(&self, group: &str, account: &str, ages: [ChronoDuration; 2]) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        state.groups.insert(group.to_string());
        let keys = vec![
            AccountKey {
                name: "key1".to_string(),
                value: format!("{account}-key1-seed"),
                creation_time: Some(now - ages[0]),
            },
            AccountKey {
                name: "key2".to_string(),
                value: format!("{account}-key2-seed"),
                creation_time: Some(now - ages[1]),
            },
        ];
        state
            .accounts
            .insert(account.to_string(), (group.to_string(), keys));
    }

    /// Age every key of `account` so that key `name` was created `age` ago
    pub fn set_key_age(&self, account: &str, name: &str, age: ChronoDuration) {
        let mut state = self.state.lock().unwrap();
        let (_, keys) = state.accounts.get_mut(account).expect("account exists");
        let key = keys.iter_mut().find(|k| k.name == name).expect("key exists");
        key.creation_time = Some(Utc::now() - age);
    }

    /// Rotate a key behind the controller's back
    pub fn regenerate_externally(&self, account: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.key_generation += 1;
        let generation = state.key_generation;
        let (_, keys) = state.accounts.get_mut(account).expect("account exists");
        let key = keys.iter_mut().find(|k| k.name == name).expect("key exists");
        key.value = format!("{account}-{name}-external-{generation}");
        key.creation_time = Some(Utc::now());
    }

    pub fn seed_container(&self, account: &str, container: &str) {
        self.state
            .lock()
            .unwrap()
            .containers
            .insert((account.to_string(), container.to_string()));
    }

    pub fn seed_policy(&self, account: &str, container: &str, days: i32, locked: bool) {
        self.state.lock().unwrap().policies.insert(
            (account.to_string(), container.to_string()),
            FakePolicy {
                days,
                locked,
                etag: new_etag(),
            },
        );
    }

    pub fn policy(&self, account: &str, container: &str) -> Option<ImmutabilityPolicy> {
        self.state
            .lock()
            .unwrap()
            .policies
            .get(&(account.to_string(), container.to_string()))
            .map(FakePolicy::to_policy)
    }

    pub fn keys(&self, account: &str) -> Option<AccountKeySet> {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .get(account)
            .map(|(_, keys)| AccountKeySet::from_keys(account, keys.clone()).unwrap())
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.state.lock().unwrap().groups.contains(group)
    }

    pub fn has_account(&self, account: &str) -> bool {
        self.state.lock().unwrap().accounts.contains_key(account)
    }

    pub fn has_container(&self, account: &str, container: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .contains(&(account.to_string(), container.to_string()))
    }

    /// Record `call` and fail if `operation` is marked failing
    fn enter(
        &self,
        operation: &'static str,
        call: Call,
    ) -> CloudResult<std::sync::MutexGuard<'_, CloudState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(operation) {
            return Err(injected(operation));
        }
        Ok(state)
    }
}

fn policy_key(account: &str, container: &str) -> (String, String) {
    (account.to_string(), container.to_string())
}

fn stale_etag(resource: &str) -> CloudError {
    CloudError::PreconditionFailed {
        resource: resource.to_string(),
        message: "etag mismatch".to_string(),
    }
}

#[async_trait]
impl CloudResourceClient for FakeCloud {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn storage_domain(&self) -> &str {
        DOMAIN
    }

    async fn create_or_update_resource_group(&self, group: &str, region: &str) -> CloudResult<()> {
        let mut state = self.enter(
            "create_or_update_resource_group",
            Call::CreateOrUpdateResourceGroup {
                group: group.to_string(),
                region: region.to_string(),
            },
        )?;
        state.groups.insert(group.to_string());
        Ok(())
    }

    async fn delete_resource_group(&self, group: &str) -> CloudResult<()> {
        let mut state = self.enter(
            "delete_resource_group",
            Call::DeleteResourceGroup {
                group: group.to_string(),
            },
        )?;
        if !state.groups.remove(group) {
            return Err(CloudError::not_found(format!("resource group {group}")));
        }
        let accounts: Vec<String> = state
            .accounts
            .iter()
            .filter(|(_, (owner, _))| owner == group)
            .map(|(account, _)| account.clone())
            .collect();
        for account in accounts {
            state.accounts.remove(&account);
            state.containers.retain(|(a, _)| *a != account);
            state.policies.retain(|(a, _), _| *a != account);
        }
        Ok(())
    }

    async fn create_or_update_storage_account(
        &self,
        group: &str,
        account: &str,
        region: &str,
        key_expiration_days: Option<i32>,
    ) -> CloudResult<()> {
        let mut state = self.enter(
            "create_or_update_storage_account",
            Call::CreateOrUpdateStorageAccount {
                account: account.to_string(),
                region: region.to_string(),
                key_expiration_days,
            },
        )?;
        if !state.groups.contains(group) {
            return Err(CloudError::not_found(format!("resource group {group}")));
        }
        if !state.accounts.contains_key(account) {
            let now = Utc::now();
            let keys = vec![
                AccountKey {
                    name: "key1".to_string(),
                    value: format!("{account}-key1-initial"),
                    creation_time: Some(now - ChronoDuration::seconds(2)),
                },
                AccountKey {
                    name: "key2".to_string(),
                    value: format!("{account}-key2-initial"),
                    creation_time: Some(now - ChronoDuration::seconds(1)),
                },
            ];
            state
                .accounts
                .insert(account.to_string(), (group.to_string(), keys));
        }
        Ok(())
    }

    async fn list_keys(&self, _group: &str, account: &str) -> CloudResult<AccountKeySet> {
        let state = self.enter(
            "list_keys",
            Call::ListKeys {
                account: account.to_string(),
            },
        )?;
        let (_, keys) = state
            .accounts
            .get(account)
            .ok_or_else(|| CloudError::not_found(format!("storage account {account}")))?;
        AccountKeySet::from_keys(account, keys.clone())
    }

    async fn rotate_key(
        &self,
        _group: &str,
        account: &str,
        key_name: &str,
    ) -> CloudResult<AccountKeySet> {
        let mut state = self.enter(
            "rotate_key",
            Call::RotateKey {
                account: account.to_string(),
                key_name: key_name.to_string(),
            },
        )?;
        state.key_generation += 1;
        let generation = state.key_generation;
        let (_, keys) = state
            .accounts
            .get_mut(account)
            .ok_or_else(|| CloudError::not_found(format!("storage account {account}")))?;
        let key = keys
            .iter_mut()
            .find(|k| k.name == key_name)
            .ok_or_else(|| CloudError::not_found(format!("key {key_name}")))?;
        key.value = format!("{account}-{key_name}-rotated-{generation}");
        key.creation_time = Some(Utc::now());
        AccountKeySet::from_keys(account, keys.clone())
    }

    async fn get_container(&self, _group: &str, account: &str, container: &str) -> CloudResult<()> {
        let state = self.enter(
            "get_container",
            Call::GetContainer {
                container: container.to_string(),
            },
        )?;
        if state.containers.contains(&policy_key(account, container)) {
            Ok(())
        } else {
            Err(CloudError::not_found(format!("container {container}")))
        }
    }

    async fn create_container(
        &self,
        _group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<()> {
        let mut state = self.enter(
            "create_container",
            Call::CreateContainer {
                container: container.to_string(),
            },
        )?;
        if !state.accounts.contains_key(account) {
            return Err(CloudError::not_found(format!("storage account {account}")));
        }
        state.containers.insert(policy_key(account, container));
        Ok(())
    }

    async fn delete_container(
        &self,
        _group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<()> {
        let mut state = self.enter(
            "delete_container",
            Call::DeleteContainer {
                container: container.to_string(),
            },
        )?;
        if !state.containers.remove(&policy_key(account, container)) {
            return Err(CloudError::not_found(format!("container {container}")));
        }
        state.policies.remove(&policy_key(account, container));
        Ok(())
    }

    async fn get_immutability_policy(
        &self,
        _group: &str,
        account: &str,
        container: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let state = self.enter("get_immutability_policy", Call::GetPolicy)?;
        state
            .policies
            .get(&policy_key(account, container))
            .map(FakePolicy::to_policy)
            .ok_or_else(|| CloudError::not_found("immutability policy"))
    }

    async fn create_or_update_immutability_policy(
        &self,
        _group: &str,
        account: &str,
        container: &str,
        days: i32,
        etag: Option<&str>,
    ) -> CloudResult<ImmutabilityPolicy> {
        let mut state = self.enter(
            "create_or_update_immutability_policy",
            Call::CreateOrUpdatePolicy {
                days,
                etag: etag.map(ToString::to_string),
            },
        )?;
        let key = policy_key(account, container);
        if let Some(existing) = state.policies.get(&key) {
            if existing.locked || etag != Some(existing.etag.as_str()) {
                return Err(stale_etag("immutability policy"));
            }
        }
        let policy = FakePolicy {
            days,
            locked: false,
            etag: new_etag(),
        };
        state.policies.insert(key, policy.clone());
        Ok(policy.to_policy())
    }

    async fn extend_immutability_policy(
        &self,
        _group: &str,
        account: &str,
        container: &str,
        days: i32,
        etag: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let mut state = self.enter(
            "extend_immutability_policy",
            Call::ExtendPolicy {
                days,
                etag: etag.to_string(),
            },
        )?;
        let policy = state
            .policies
            .get_mut(&policy_key(account, container))
            .ok_or_else(|| CloudError::not_found("immutability policy"))?;
        if !policy.locked || policy.etag != etag || days <= policy.days {
            return Err(stale_etag("immutability policy"));
        }
        policy.days = days;
        policy.etag = new_etag();
        Ok(policy.to_policy())
    }

    async fn delete_immutability_policy(
        &self,
        _group: &str,
        account: &str,
        container: &str,
        etag: &str,
    ) -> CloudResult<()> {
        let mut state = self.enter(
            "delete_immutability_policy",
            Call::DeletePolicy {
                etag: etag.to_string(),
            },
        )?;
        let key = policy_key(account, container);
        let policy = state
            .policies
            .get(&key)
            .ok_or_else(|| CloudError::not_found("immutability policy"))?;
        if policy.locked || policy.etag != etag {
            return Err(stale_etag("immutability policy"));
        }
        state.policies.remove(&key);
        Ok(())
    }

    async fn lock_immutability_policy(
        &self,
        _group: &str,
        account: &str,
        container: &str,
        etag: &str,
    ) -> CloudResult<ImmutabilityPolicy> {
        let mut state = self.enter(
            "lock_immutability_policy",
            Call::LockPolicy {
                etag: etag.to_string(),
            },
        )?;
        let policy = state
            .policies
            .get_mut(&policy_key(account, container))
            .ok_or_else(|| CloudError::not_found("immutability policy"))?;
        if policy.etag != etag {
            return Err(stale_etag("immutability policy"));
        }
        policy.locked = true;
        policy.etag = new_etag();
        Ok(policy.to_policy())
    }
}

/// In-memory secret store
#[derive(Debug, Default)]
pub struct FakeSecretStore {
    secrets: Mutex<BTreeMap<(String, String), SecretData>>,
    writes: Mutex<usize>,
    fail_next_update: Mutex<bool>,
}

fn store_key(reference: &GeneratedSecretRef) -> (String, String) {
    (reference.namespace.clone(), reference.name.clone())
}

impl FakeSecretStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn data(&self, reference: &GeneratedSecretRef) -> Option<SecretData> {
        self.secrets.lock().unwrap().get(&store_key(reference)).cloned()
    }

    pub fn storage_key(&self, reference: &GeneratedSecretRef) -> Option<String> {
        self.data(reference)
            .and_then(|data| data.get("storageKey").cloned())
    }

    pub fn insert(&self, reference: &GeneratedSecretRef, data: SecretData) {
        self.secrets
            .lock()
            .unwrap()
            .insert(store_key(reference), data);
    }

    pub fn remove(&self, reference: &GeneratedSecretRef) {
        self.secrets.lock().unwrap().remove(&store_key(reference));
    }

    pub fn len(&self) -> usize {
        self.secrets.lock().unwrap().len()
    }

    /// Number of create and update calls that succeeded
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// Make the next `update` call fail without touching the secret
    pub fn fail_next_update(&self) {
        *self.fail_next_update.lock().unwrap() = true;
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn create(
        &self,
        reference: &GeneratedSecretRef,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&store_key(reference)) {
            return Err(StoreError::AlreadyExists(reference.to_string()));
        }
        secrets.insert(store_key(reference), data.clone());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn get(&self, reference: &GeneratedSecretRef) -> Result<Option<SecretData>, StoreError> {
        Ok(self.data(reference))
    }

    async fn update(
        &self,
        reference: &GeneratedSecretRef,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        if std::mem::take(&mut *self.fail_next_update.lock().unwrap()) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "secret {reference} update rejected"
            )));
        }
        let mut secrets = self.secrets.lock().unwrap();
        let Some(existing) = secrets.get_mut(&store_key(reference)) else {
            return Err(StoreError::NotFound(reference.to_string()));
        };
        *existing = data.clone();
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn delete(&self, reference: &GeneratedSecretRef) -> Result<(), StoreError> {
        match self.secrets.lock().unwrap().remove(&store_key(reference)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(reference.to_string())),
        }
    }
}

/// In-memory bucket status
#[derive(Debug, Default)]
pub struct FakeStatusWriter {
    references: Mutex<HashMap<String, GeneratedSecretRef>>,
    cleared_signals: Mutex<Vec<String>>,
    fail_record: Mutex<bool>,
}

impl FakeStatusWriter {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reference(&self, bucket: &str) -> Option<GeneratedSecretRef> {
        self.references.lock().unwrap().get(bucket).cloned()
    }

    pub fn cleared_signals(&self) -> Vec<String> {
        self.cleared_signals.lock().unwrap().clone()
    }

    pub fn fail_record(&self, fail: bool) {
        *self.fail_record.lock().unwrap() = fail;
    }
}

#[async_trait]
impl BucketStatusWriter for FakeStatusWriter {
    async fn record_generated_secret(
        &self,
        bucket: &str,
        reference: &GeneratedSecretRef,
    ) -> anyhow::Result<()> {
        if *self.fail_record.lock().unwrap() {
            anyhow::bail!("status subresource unavailable");
        }
        self.references
            .lock()
            .unwrap()
            .insert(bucket.to_string(), reference.clone());
        Ok(())
    }

    async fn clear_rotate_signal(&self, bucket: &str) -> anyhow::Result<()> {
        self.cleared_signals.lock().unwrap().push(bucket.to_string());
        Ok(())
    }
}

/// Fakes wired into a lifecycle
pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub store: Arc<FakeSecretStore>,
    pub status: Arc<FakeStatusWriter>,
    pub lifecycle: BucketLifecycle,
    pub cancel: CancellationToken,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        let cloud = FakeCloud::new();
        let store = FakeSecretStore::new();
        let status = FakeStatusWriter::new();
        let lifecycle = BucketLifecycle::new(
            Arc::clone(&cloud) as Arc<dyn CloudResourceClient>,
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::clone(&status) as Arc<dyn BucketStatusWriter>,
            SECRET_NAMESPACE,
        );
        Self {
            cloud,
            store,
            status,
            lifecycle,
            cancel: CancellationToken::new(),
        }
    }
}

pub fn request(name: &str) -> BucketRequest {
    BucketRequest::new(name, "westeurope")
}

pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86_400)
}

pub fn hours(n: u64) -> Duration {
    Duration::from_secs(n * 3_600)
}

pub fn immutability(retention: Duration, locked: bool) -> Option<ImmutabilityConfig> {
    Some(ImmutabilityConfig {
        retention_period: retention,
        locked,
    })
}

pub fn rotation(period: Duration, key_expiration: Option<Duration>) -> Option<RotationConfig> {
    Some(RotationConfig {
        rotation_period: period,
        key_expiration_period: key_expiration,
    })
}

/// Key created `days` days ago, for seeding
pub fn age_days(days: i64) -> ChronoDuration {
    ChronoDuration::days(days)
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
