//! Capability ports the applier expects from the platform's resource
//! services. One trait per resource kind; implementations live with the
//! services themselves.
//!
//! Lookups return `Ok(None)` for "not found" and `Err` only for real
//! failures — the dry-run engine treats the two very differently (a missing
//! resource diffs as new, a failed lookup aborts the run).

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use uuid::Uuid;

use lumen_core::models::{
    Bucket, BucketUpdate, Check, CheckUpdate, Dashboard, DashboardUpdate, Label, LabelMapping,
    LabelUpdate, NotificationEndpoint, NotificationRule, Organization, ResourceType, Task,
    TaskUpdate, TelegrafConfig, TelegrafUpdate, Variable, VariableUpdate,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Error)]
pub enum PortError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

pub trait BucketService: Send + Sync {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Bucket>, PortError>>;

    fn find_all(&self, org_id: Uuid, limit: usize)
        -> BoxFuture<'_, Result<Vec<Bucket>, PortError>>;

    fn create(&self, bucket: Bucket) -> BoxFuture<'_, Result<Bucket, PortError>>;

    fn update(&self, id: Uuid, update: BucketUpdate) -> BoxFuture<'_, Result<Bucket, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait CheckService: Send + Sync {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Check>, PortError>>;

    fn find_all(&self, org_id: Uuid, limit: usize) -> BoxFuture<'_, Result<Vec<Check>, PortError>>;

    fn create(&self, check: Check) -> BoxFuture<'_, Result<Check, PortError>>;

    fn update(&self, id: Uuid, update: CheckUpdate) -> BoxFuture<'_, Result<Check, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait DashboardService: Send + Sync {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Dashboard>, PortError>>;

    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Dashboard>, PortError>>;

    fn create(&self, dashboard: Dashboard) -> BoxFuture<'_, Result<Dashboard, PortError>>;

    fn update(
        &self,
        id: Uuid,
        update: DashboardUpdate,
    ) -> BoxFuture<'_, Result<Dashboard, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait LabelService: Send + Sync {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Label>, PortError>>;

    fn find_all(&self, org_id: Uuid, limit: usize) -> BoxFuture<'_, Result<Vec<Label>, PortError>>;

    fn create(&self, label: Label) -> BoxFuture<'_, Result<Label, PortError>>;

    fn update(&self, id: Uuid, update: LabelUpdate) -> BoxFuture<'_, Result<Label, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;

    /// Labels currently attached to the given resource.
    fn find_resource_labels(
        &self,
        resource_id: Uuid,
        resource_type: ResourceType,
    ) -> BoxFuture<'_, Result<Vec<Label>, PortError>>;

    fn create_mapping(&self, mapping: LabelMapping) -> BoxFuture<'_, Result<(), PortError>>;

    fn delete_mapping(&self, mapping: LabelMapping) -> BoxFuture<'_, Result<(), PortError>>;
}

/// Endpoints only expose bulk listing; callers filter by name client-side.
pub trait NotificationEndpointService: Send + Sync {
    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<NotificationEndpoint>, PortError>>;

    fn create(
        &self,
        endpoint: NotificationEndpoint,
    ) -> BoxFuture<'_, Result<NotificationEndpoint, PortError>>;

    fn update(
        &self,
        id: Uuid,
        endpoint: NotificationEndpoint,
    ) -> BoxFuture<'_, Result<NotificationEndpoint, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait NotificationRuleService: Send + Sync {
    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<NotificationRule>, PortError>>;

    fn create(
        &self,
        rule: NotificationRule,
    ) -> BoxFuture<'_, Result<NotificationRule, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait OrganizationService: Send + Sync {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Organization>, PortError>>;
}

pub trait SecretService: Send + Sync {
    fn secret_keys(&self, org_id: Uuid) -> BoxFuture<'_, Result<Vec<String>, PortError>>;

    fn put_secrets(
        &self,
        org_id: Uuid,
        secrets: BTreeMap<String, String>,
    ) -> BoxFuture<'_, Result<(), PortError>>;

    /// Removes exactly the named keys; other org secrets are untouched.
    fn delete_secrets(
        &self,
        org_id: Uuid,
        keys: Vec<String>,
    ) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait TaskService: Send + Sync {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Task>, PortError>>;

    fn find_all(&self, org_id: Uuid, limit: usize) -> BoxFuture<'_, Result<Vec<Task>, PortError>>;

    fn create(&self, task: Task) -> BoxFuture<'_, Result<Task, PortError>>;

    fn update(&self, id: Uuid, update: TaskUpdate) -> BoxFuture<'_, Result<Task, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

pub trait TelegrafService: Send + Sync {
    fn find_by_name<'a>(
        &'a self,
        org_id: Uuid,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<TelegrafConfig>, PortError>>;

    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TelegrafConfig>, PortError>>;

    fn create(&self, config: TelegrafConfig) -> BoxFuture<'_, Result<TelegrafConfig, PortError>>;

    fn update(
        &self,
        id: Uuid,
        update: TelegrafUpdate,
    ) -> BoxFuture<'_, Result<TelegrafConfig, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}

/// Variables only expose bulk listing; callers filter by name client-side.
pub trait VariableService: Send + Sync {
    fn find_all(
        &self,
        org_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Variable>, PortError>>;

    fn create(&self, variable: Variable) -> BoxFuture<'_, Result<Variable, PortError>>;

    fn update(
        &self,
        id: Uuid,
        update: VariableUpdate,
    ) -> BoxFuture<'_, Result<Variable, PortError>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}
