//! In-memory platform used by the scenario tests. Every service call is
//! recorded so tests can assert ordering, counts, and rollback behavior.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use lumen_core::models::{
    Bucket, BucketKind, BucketUpdate, Check, CheckUpdate, Dashboard, DashboardUpdate,
    EndpointKind, Label, LabelMapping, LabelProperties, LabelUpdate, NotificationEndpoint,
    NotificationRule, Organization, ResourceType, SecretField, Status, Task, TaskKind,
    TaskUpdate, TelegrafConfig, TelegrafUpdate, Variable, VariableUpdate,
};
use lumen_pack::ports::{
    BoxFuture, BucketService, CheckService, DashboardService, LabelService,
    NotificationEndpointService, NotificationRuleService, OrganizationService, PortError,
    SecretService, TaskService, TelegrafService, VariableService,
};
use lumen_pack::{Platform, Service};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(ResourceType, String),
    Create(ResourceType, String),
    Update(ResourceType, Uuid),
    Delete(ResourceType, Uuid),
    CreateMapping { label_id: Uuid, resource_id: Uuid },
    DeleteMapping { label_id: Uuid, resource_id: Uuid },
    PutSecrets(Vec<String>),
    DeleteSecrets(Vec<String>),
}

#[derive(Default)]
pub struct MockState {
    pub orgs: BTreeMap<Uuid, Organization>,
    pub buckets: BTreeMap<Uuid, Bucket>,
    pub checks: BTreeMap<Uuid, Check>,
    pub dashboards: BTreeMap<Uuid, Dashboard>,
    pub labels: BTreeMap<Uuid, Label>,
    pub endpoints: BTreeMap<Uuid, NotificationEndpoint>,
    pub rules: BTreeMap<Uuid, NotificationRule>,
    pub tasks: BTreeMap<Uuid, Task>,
    pub telegrafs: BTreeMap<Uuid, TelegrafConfig>,
    pub variables: BTreeMap<Uuid, Variable>,
    pub mappings: Vec<LabelMapping>,
    pub secrets: BTreeMap<Uuid, BTreeMap<String, String>>,
}

#[derive(Default)]
pub struct MockPlatform {
    pub state: Mutex<MockState>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    /// Resource names whose create calls fail.
    fail_creates: Mutex<BTreeSet<String>>,
    /// Resource names whose find-by-name calls fail (not "not found").
    fail_finds: Mutex<BTreeSet<String>>,
    /// Artificial latency inside create calls, for concurrency assertions.
    create_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Arc<MockPlatform> {
        Arc::new(MockPlatform::default())
    }

    pub fn service(self: &Arc<Self>) -> Service {
        Service::new(self.platform())
    }

    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            buckets: Arc::clone(self) as Arc<dyn BucketService>,
            checks: Arc::clone(self) as Arc<dyn CheckService>,
            dashboards: Arc::clone(self) as Arc<dyn DashboardService>,
            labels: Arc::clone(self) as Arc<dyn LabelService>,
            endpoints: Arc::clone(self) as Arc<dyn NotificationEndpointService>,
            orgs: Arc::clone(self) as Arc<dyn OrganizationService>,
            rules: Arc::clone(self) as Arc<dyn NotificationRuleService>,
            secrets: Arc::clone(self) as Arc<dyn SecretService>,
            tasks: Arc::clone(self) as Arc<dyn TaskService>,
            telegrafs: Arc::clone(self) as Arc<dyn TelegrafService>,
            variables: Arc::clone(self) as Arc<dyn VariableService>,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn call_position(&self, call: &Call) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c == call)
    }

    pub fn fail_create(&self, name: &str) {
        self.fail_creates.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_find(&self, name: &str) {
        self.fail_finds.lock().unwrap().insert(name.to_string());
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    fn id(&self) -> Uuid {
        Uuid::from_u128(1000 + self.next_id.fetch_add(1, Ordering::SeqCst) as u128)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_find(&self, name: &str) -> Result<(), PortError> {
        if self.fail_finds.lock().unwrap().contains(name) {
            Err(PortError::Failed(format!("lookup of {name:?} failed")))
        } else {
            Ok(())
        }
    }

    fn check_create(&self, name: &str) -> Result<(), PortError> {
        if self.fail_creates.lock().unwrap().contains(name) {
            Err(PortError::Failed(format!("create of {name:?} refused")))
        } else {
            Ok(())
        }
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    // ── seeding ─────────────────────────────────────────────────────────

    pub fn seed_org(&self, name: &str) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().orgs.insert(
            id,
            Organization {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn seed_bucket(&self, org_id: Uuid, name: &str, description: &str, retention: u64) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().buckets.insert(
            id,
            Bucket {
                id,
                org_id,
                name: name.to_string(),
                description: description.to_string(),
                retention_seconds: retention,
                kind: BucketKind::User,
            },
        );
        id
    }

    pub fn seed_system_bucket(&self, org_id: Uuid, name: &str) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().buckets.insert(
            id,
            Bucket {
                id,
                org_id,
                name: name.to_string(),
                description: String::new(),
                retention_seconds: 0,
                kind: BucketKind::System,
            },
        );
        id
    }

    pub fn seed_label(&self, org_id: Uuid, name: &str, color: &str) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().labels.insert(
            id,
            Label {
                id,
                org_id,
                name: name.to_string(),
                properties: LabelProperties {
                    color: color.to_string(),
                    description: String::new(),
                },
            },
        );
        id
    }

    pub fn seed_endpoint(&self, org_id: Uuid, name: &str, kind: EndpointKind) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().endpoints.insert(
            id,
            NotificationEndpoint {
                id,
                org_id,
                name: name.to_string(),
                description: String::new(),
                status: Status::Active,
                kind,
                url: "https://live.example.com".to_string(),
                routing_key: None,
                token: None,
                username: None,
                password: None,
            },
        );
        id
    }

    pub fn seed_task(&self, org_id: Uuid, name: &str, kind: TaskKind) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().tasks.insert(
            id,
            Task {
                id,
                org_id,
                owner_id: Uuid::nil(),
                name: name.to_string(),
                description: String::new(),
                kind,
                status: Status::Active,
                script: "option task = {}".to_string(),
                every: Some("1h".to_string()),
            },
        );
        id
    }

    pub fn seed_check(&self, org_id: Uuid, name: &str, task_id: Uuid) -> Uuid {
        let id = self.id();
        self.state.lock().unwrap().checks.insert(
            id,
            Check {
                id,
                org_id,
                task_id,
                name: name.to_string(),
                description: String::new(),
                status: Status::Active,
                query: "from(bucket: \"b\")".to_string(),
                every: "1m".to_string(),
            },
        );
        id
    }

    pub fn seed_mapping(&self, label_id: Uuid, resource_id: Uuid, resource_type: ResourceType) {
        self.state.lock().unwrap().mappings.push(LabelMapping {
            label_id,
            resource_id,
            resource_type,
        });
    }

    pub fn seed_secret(&self, org_id: Uuid, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .secrets
            .entry(org_id)
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn secret_keys_for(&self, org_id: Uuid) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&org_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl BucketService for MockPlatform {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Bucket>, PortError>> {
        Box::pin(async move {
            self.record(Call::Find(ResourceType::Bucket, name.to_string()));
            self.check_find(name)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .buckets
                .values()
                .find(|b| b.org_id == org_id && b.name == name)
                .cloned())
        })
    }

    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Bucket>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<Bucket> = self
                .state
                .lock()
                .unwrap()
                .buckets
                .values()
                .filter(|b| b.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(&self, mut bucket: Bucket) -> BoxFuture<'_, Result<Bucket, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&bucket.name).map(|()| {
                bucket.id = self.id();
                self.record(Call::Create(ResourceType::Bucket, bucket.name.clone()));
                self.state
                    .lock()
                    .unwrap()
                    .buckets
                    .insert(bucket.id, bucket.clone());
                bucket
            });
            self.exit();
            result
        })
    }

    fn update(&self, id: Uuid, update: BucketUpdate) -> BoxFuture<'_, Result<Bucket, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Bucket, id));
            let mut state = self.state.lock().unwrap();
            let bucket = state
                .buckets
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("bucket {id}")))?;
            if let Some(description) = update.description {
                bucket.description = description;
            }
            if let Some(retention) = update.retention_seconds {
                bucket.retention_seconds = retention;
            }
            Ok(bucket.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Bucket, id));
            self.state
                .lock()
                .unwrap()
                .buckets
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("bucket {id}")))
        })
    }
}

impl CheckService for MockPlatform {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Check>, PortError>> {
        Box::pin(async move {
            self.record(Call::Find(ResourceType::Check, name.to_string()));
            self.check_find(name)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .checks
                .values()
                .find(|c| c.org_id == org_id && c.name == name)
                .cloned())
        })
    }

    fn find_all(&self, org_id: Uuid, limit: usize) -> BoxFuture<'_, Result<Vec<Check>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<Check> = self
                .state
                .lock()
                .unwrap()
                .checks
                .values()
                .filter(|c| c.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(&self, mut check: Check) -> BoxFuture<'_, Result<Check, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&check.name).map(|()| {
                check.id = self.id();
                check.task_id = self.id();
                self.record(Call::Create(ResourceType::Check, check.name.clone()));
                self.state
                    .lock()
                    .unwrap()
                    .checks
                    .insert(check.id, check.clone());
                check
            });
            self.exit();
            result
        })
    }

    fn update(&self, id: Uuid, update: CheckUpdate) -> BoxFuture<'_, Result<Check, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Check, id));
            let mut state = self.state.lock().unwrap();
            let check = state
                .checks
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("check {id}")))?;
            if let Some(description) = update.description {
                check.description = description;
            }
            if let Some(status) = update.status {
                check.status = status;
            }
            if let Some(query) = update.query {
                check.query = query;
            }
            if let Some(every) = update.every {
                check.every = every;
            }
            Ok(check.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Check, id));
            self.state
                .lock()
                .unwrap()
                .checks
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("check {id}")))
        })
    }
}

impl DashboardService for MockPlatform {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Dashboard>, PortError>> {
        Box::pin(async move {
            self.record(Call::Find(ResourceType::Dashboard, name.to_string()));
            self.check_find(name)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .dashboards
                .values()
                .find(|d| d.org_id == org_id && d.name == name)
                .cloned())
        })
    }

    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Dashboard>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<Dashboard> = self
                .state
                .lock()
                .unwrap()
                .dashboards
                .values()
                .filter(|d| d.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(&self, mut dashboard: Dashboard) -> BoxFuture<'_, Result<Dashboard, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&dashboard.name).map(|()| {
                dashboard.id = self.id();
                self.record(Call::Create(ResourceType::Dashboard, dashboard.name.clone()));
                self.state
                    .lock()
                    .unwrap()
                    .dashboards
                    .insert(dashboard.id, dashboard.clone());
                dashboard
            });
            self.exit();
            result
        })
    }

    fn update(
        &self,
        id: Uuid,
        update: DashboardUpdate,
    ) -> BoxFuture<'_, Result<Dashboard, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Dashboard, id));
            let mut state = self.state.lock().unwrap();
            let dashboard = state
                .dashboards
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("dashboard {id}")))?;
            if let Some(description) = update.description {
                dashboard.description = description;
            }
            if let Some(cells) = update.cells {
                dashboard.cells = cells;
            }
            Ok(dashboard.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Dashboard, id));
            self.state
                .lock()
                .unwrap()
                .dashboards
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("dashboard {id}")))
        })
    }
}

impl LabelService for MockPlatform {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Label>, PortError>> {
        Box::pin(async move {
            self.record(Call::Find(ResourceType::Label, name.to_string()));
            self.check_find(name)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .labels
                .values()
                .find(|l| l.org_id == org_id && l.name == name)
                .cloned())
        })
    }

    fn find_all(&self, org_id: Uuid, limit: usize) -> BoxFuture<'_, Result<Vec<Label>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<Label> = self
                .state
                .lock()
                .unwrap()
                .labels
                .values()
                .filter(|l| l.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(&self, mut label: Label) -> BoxFuture<'_, Result<Label, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&label.name).map(|()| {
                label.id = self.id();
                self.record(Call::Create(ResourceType::Label, label.name.clone()));
                self.state
                    .lock()
                    .unwrap()
                    .labels
                    .insert(label.id, label.clone());
                label
            });
            self.exit();
            result
        })
    }

    fn update(&self, id: Uuid, update: LabelUpdate) -> BoxFuture<'_, Result<Label, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Label, id));
            let mut state = self.state.lock().unwrap();
            let label = state
                .labels
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("label {id}")))?;
            if let Some(properties) = update.properties {
                label.properties = properties;
            }
            Ok(label.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Label, id));
            self.state
                .lock()
                .unwrap()
                .labels
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("label {id}")))
        })
    }

    fn find_resource_labels(
        &self,
        resource_id: Uuid,
        resource_type: ResourceType,
    ) -> BoxFuture<'_, Result<Vec<Label>, PortError>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state
                .mappings
                .iter()
                .filter(|m| m.resource_id == resource_id && m.resource_type == resource_type)
                .filter_map(|m| state.labels.get(&m.label_id).cloned())
                .collect())
        })
    }

    fn create_mapping(&self, mapping: LabelMapping) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::CreateMapping {
                label_id: mapping.label_id,
                resource_id: mapping.resource_id,
            });
            self.state.lock().unwrap().mappings.push(mapping);
            Ok(())
        })
    }

    fn delete_mapping(&self, mapping: LabelMapping) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::DeleteMapping {
                label_id: mapping.label_id,
                resource_id: mapping.resource_id,
            });
            self.state.lock().unwrap().mappings.retain(|m| *m != mapping);
            Ok(())
        })
    }
}

impl NotificationEndpointService for MockPlatform {
    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<NotificationEndpoint>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<NotificationEndpoint> = self
                .state
                .lock()
                .unwrap()
                .endpoints
                .values()
                .filter(|e| e.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(
        &self,
        mut endpoint: NotificationEndpoint,
    ) -> BoxFuture<'_, Result<NotificationEndpoint, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&endpoint.name).map(|()| {
                endpoint.id = self.id();
                // The platform owns credential storage: secret refs are
                // re-keyed under the endpoint's ID.
                let id = endpoint.id;
                let rekey = |slot: &mut Option<SecretField>, suffix: &str| {
                    if slot.is_some() {
                        *slot = Some(SecretField {
                            key: format!("{id}-{suffix}"),
                        });
                    }
                };
                rekey(&mut endpoint.routing_key, "routing-key");
                rekey(&mut endpoint.token, "token");
                rekey(&mut endpoint.username, "username");
                rekey(&mut endpoint.password, "password");
                self.record(Call::Create(
                    ResourceType::NotificationEndpoint,
                    endpoint.name.clone(),
                ));
                self.state
                    .lock()
                    .unwrap()
                    .endpoints
                    .insert(endpoint.id, endpoint.clone());
                endpoint
            });
            self.exit();
            result
        })
    }

    fn update(
        &self,
        id: Uuid,
        mut endpoint: NotificationEndpoint,
    ) -> BoxFuture<'_, Result<NotificationEndpoint, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::NotificationEndpoint, id));
            let mut state = self.state.lock().unwrap();
            if !state.endpoints.contains_key(&id) {
                return Err(PortError::NotFound(format!("notification endpoint {id}")));
            }
            endpoint.id = id;
            state.endpoints.insert(id, endpoint.clone());
            Ok(endpoint)
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::NotificationEndpoint, id));
            self.state
                .lock()
                .unwrap()
                .endpoints
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("notification endpoint {id}")))
        })
    }
}

impl NotificationRuleService for MockPlatform {
    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<NotificationRule>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<NotificationRule> = self
                .state
                .lock()
                .unwrap()
                .rules
                .values()
                .filter(|r| r.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(
        &self,
        mut rule: NotificationRule,
    ) -> BoxFuture<'_, Result<NotificationRule, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&rule.name).map(|()| {
                rule.id = self.id();
                rule.task_id = self.id();
                self.record(Call::Create(
                    ResourceType::NotificationRule,
                    rule.name.clone(),
                ));
                self.state.lock().unwrap().rules.insert(rule.id, rule.clone());
                rule
            });
            self.exit();
            result
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::NotificationRule, id));
            self.state
                .lock()
                .unwrap()
                .rules
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("notification rule {id}")))
        })
    }
}

impl OrganizationService for MockPlatform {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Organization>, PortError>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().orgs.get(&id).cloned()) })
    }
}

impl SecretService for MockPlatform {
    fn secret_keys(&self, org_id: Uuid) -> BoxFuture<'_, Result<Vec<String>, PortError>> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .secrets
                .get(&org_id)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn put_secrets(
        &self,
        org_id: Uuid,
        secrets: BTreeMap<String, String>,
    ) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::PutSecrets(secrets.keys().cloned().collect()));
            self.state
                .lock()
                .unwrap()
                .secrets
                .entry(org_id)
                .or_default()
                .extend(secrets);
            Ok(())
        })
    }

    fn delete_secrets(
        &self,
        org_id: Uuid,
        keys: Vec<String>,
    ) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::DeleteSecrets(keys.clone()));
            if let Some(org_secrets) = self.state.lock().unwrap().secrets.get_mut(&org_id) {
                for key in &keys {
                    org_secrets.remove(key);
                }
            }
            Ok(())
        })
    }
}

impl TaskService for MockPlatform {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Task>, PortError>> {
        Box::pin(async move {
            self.record(Call::Find(ResourceType::Task, name.to_string()));
            self.check_find(name)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .tasks
                .values()
                .find(|t| t.org_id == org_id && t.name == name)
                .cloned())
        })
    }

    fn find_all(&self, org_id: Uuid, limit: usize) -> BoxFuture<'_, Result<Vec<Task>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<Task> = self
                .state
                .lock()
                .unwrap()
                .tasks
                .values()
                .filter(|t| t.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(&self, mut task: Task) -> BoxFuture<'_, Result<Task, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&task.name).map(|()| {
                task.id = self.id();
                self.record(Call::Create(ResourceType::Task, task.name.clone()));
                self.state.lock().unwrap().tasks.insert(task.id, task.clone());
                task
            });
            self.exit();
            result
        })
    }

    fn update(&self, id: Uuid, update: TaskUpdate) -> BoxFuture<'_, Result<Task, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Task, id));
            let mut state = self.state.lock().unwrap();
            let task = state
                .tasks
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("task {id}")))?;
            if let Some(description) = update.description {
                task.description = description;
            }
            if let Some(status) = update.status {
                task.status = status;
            }
            if let Some(script) = update.script {
                task.script = script;
            }
            if let Some(every) = update.every {
                task.every = Some(every);
            }
            Ok(task.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Task, id));
            self.state
                .lock()
                .unwrap()
                .tasks
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("task {id}")))
        })
    }
}

impl TelegrafService for MockPlatform {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<TelegrafConfig>, PortError>> {
        Box::pin(async move {
            self.record(Call::Find(ResourceType::Telegraf, name.to_string()));
            self.check_find(name)?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .telegrafs
                .values()
                .find(|t| t.org_id == org_id && t.name == name)
                .cloned())
        })
    }

    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TelegrafConfig>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<TelegrafConfig> = self
                .state
                .lock()
                .unwrap()
                .telegrafs
                .values()
                .filter(|t| t.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(
        &self,
        mut config: TelegrafConfig,
    ) -> BoxFuture<'_, Result<TelegrafConfig, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&config.name).map(|()| {
                config.id = self.id();
                self.record(Call::Create(ResourceType::Telegraf, config.name.clone()));
                self.state
                    .lock()
                    .unwrap()
                    .telegrafs
                    .insert(config.id, config.clone());
                config
            });
            self.exit();
            result
        })
    }

    fn update(
        &self,
        id: Uuid,
        update: TelegrafUpdate,
    ) -> BoxFuture<'_, Result<TelegrafConfig, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Telegraf, id));
            let mut state = self.state.lock().unwrap();
            let config = state
                .telegrafs
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("telegraf config {id}")))?;
            if let Some(description) = update.description {
                config.description = description;
            }
            if let Some(raw) = update.config {
                config.config = raw;
            }
            Ok(config.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Telegraf, id));
            self.state
                .lock()
                .unwrap()
                .telegrafs
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("telegraf config {id}")))
        })
    }
}

impl VariableService for MockPlatform {
    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Variable>, PortError>> {
        Box::pin(async move {
            let mut all: Vec<Variable> = self
                .state
                .lock()
                .unwrap()
                .variables
                .values()
                .filter(|v| v.org_id == org_id)
                .cloned()
                .collect();
            all.truncate(limit);
            Ok(all)
        })
    }

    fn create(&self, mut variable: Variable) -> BoxFuture<'_, Result<Variable, PortError>> {
        Box::pin(async move {
            self.enter().await;
            let result = self.check_create(&variable.name).map(|()| {
                variable.id = self.id();
                self.record(Call::Create(ResourceType::Variable, variable.name.clone()));
                self.state
                    .lock()
                    .unwrap()
                    .variables
                    .insert(variable.id, variable.clone());
                variable
            });
            self.exit();
            result
        })
    }

    fn update(
        &self,
        id: Uuid,
        update: VariableUpdate,
    ) -> BoxFuture<'_, Result<Variable, PortError>> {
        Box::pin(async move {
            self.record(Call::Update(ResourceType::Variable, id));
            let mut state = self.state.lock().unwrap();
            let variable = state
                .variables
                .get_mut(&id)
                .ok_or_else(|| PortError::NotFound(format!("variable {id}")))?;
            if let Some(description) = update.description {
                variable.description = description;
            }
            if let Some(arguments) = update.arguments {
                variable.arguments = arguments;
            }
            Ok(variable.clone())
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.record(Call::Delete(ResourceType::Variable, id));
            self.state
                .lock()
                .unwrap()
                .variables
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::NotFound(format!("variable {id}")))
        })
    }
}

/// Shorthand used across the scenario tests.
pub fn pkg_from_json(raw: &str) -> lumen_pack::Pkg {
    lumen_pack::Pkg::from_json(raw).expect("package JSON must parse")
}
