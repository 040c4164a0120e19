//! The applier service: construction, stack initialization, and the
//! facade over dry-run / apply / clone (implemented in their own modules).

use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use lumen_core::ids::{IdGenerator, RandomIdGenerator, TimeGenerator, WallClock};

use crate::diff::Diff;
use crate::error::PackError;
use crate::ports::{
    BucketService, CheckService, DashboardService, LabelService, NotificationEndpointService,
    NotificationRuleService, OrganizationService, SecretService, TaskService, TelegrafService,
    VariableService,
};
use crate::stack::{Stack, StackStore};
use crate::store::MemStackStore;
use crate::summary::Summary;

/// How many apply units may be in flight at once, absent configuration.
pub const DEFAULT_APPLY_REQ_LIMIT: usize = 5;

/// Handles to the platform's resource services. All of them are required;
/// everything else about the [`Service`] has a default.
#[derive(Clone)]
pub struct Platform {
    pub buckets: Arc<dyn BucketService>,
    pub checks: Arc<dyn CheckService>,
    pub dashboards: Arc<dyn DashboardService>,
    pub labels: Arc<dyn LabelService>,
    pub endpoints: Arc<dyn NotificationEndpointService>,
    pub orgs: Arc<dyn OrganizationService>,
    pub rules: Arc<dyn NotificationRuleService>,
    pub secrets: Arc<dyn SecretService>,
    pub tasks: Arc<dyn TaskService>,
    pub telegrafs: Arc<dyn TelegrafService>,
    pub variables: Arc<dyn VariableService>,
}

/// What a dry-run produced. `issues` carries package validation problems
/// (or unresolvable references) found along the way; the diff and summary
/// still cover everything that did resolve.
#[derive(Debug)]
pub struct DryRunOutcome {
    pub summary: Summary,
    pub diff: Diff,
    pub issues: Option<PackError>,
}

pub struct Service {
    pub(crate) apply_req_limit: usize,
    pub(crate) id_gen: Arc<dyn IdGenerator>,
    pub(crate) time_gen: Arc<dyn TimeGenerator>,
    pub(crate) store: Arc<dyn StackStore>,
    pub(crate) platform: Platform,
}

impl Service {
    pub fn new(platform: Platform) -> Service {
        Service {
            apply_req_limit: DEFAULT_APPLY_REQ_LIMIT,
            id_gen: Arc::new(RandomIdGenerator),
            time_gen: Arc::new(WallClock),
            store: Arc::new(MemStackStore::default()),
            platform,
        }
    }

    pub fn with_apply_req_limit(mut self, limit: usize) -> Self {
        self.apply_req_limit = limit;
        self
    }

    pub fn with_id_generator(mut self, id_gen: Arc<dyn IdGenerator>) -> Self {
        self.id_gen = id_gen;
        self
    }

    pub fn with_time_generator(mut self, time_gen: Arc<dyn TimeGenerator>) -> Self {
        self.time_gen = time_gen;
        self
    }

    pub fn with_stack_store(mut self, store: Arc<dyn StackStore>) -> Self {
        self.store = store;
        self
    }

    /// Create a stack for the org: the durable handle the resources of
    /// later package applies are registered under. URLs must parse and the
    /// org must exist.
    pub async fn init_stack(&self, user_id: Uuid, mut stack: Stack) -> Result<Stack, PackError> {
        for raw in &stack.urls {
            if Url::parse(raw).is_err() {
                return Err(PackError::InvalidUrl(raw.clone()));
            }
        }

        let org = self
            .platform
            .orgs
            .find_by_id(stack.org_id)
            .await
            .map_err(|e| PackError::port("finding organization", e))?;
        if org.is_none() {
            return Err(PackError::OrgNotFound(stack.org_id));
        }

        stack.id = self.id_gen.id();
        let now = self.time_gen.now();
        stack.created_at = now;
        stack.updated_at = now;

        self.store
            .create_stack(stack.clone())
            .await
            .map_err(|e| PackError::port("persisting stack", e))?;

        tracing::info!(stack = %stack.id, org = %stack.org_id, user = %user_id, "stack initialized");
        Ok(stack)
    }
}
