//! The apply engine: four dependency tiers, each executed concurrently
//! under the coordinator's semaphore, each recording compensating actions
//! as it goes.
//!
//! Tier 0 writes caller-supplied secrets. Tier 1 creates/updates labels,
//! which everything else may associate to. Tier 2 runs the primary kinds
//! concurrently. Tier 3 binds and creates notification rules, then writes
//! label mappings — last, because both sides' IDs must exist by then.
//!
//! A tier that accumulates any error stops the apply; everything recorded
//! so far is replayed in reverse.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use lumen_core::models::{
    Bucket, BucketKind, BucketUpdate, Check, CheckUpdate, Dashboard, DashboardUpdate, Label,
    LabelMapping, LabelProperties, LabelUpdate, NotificationEndpoint, NotificationRule,
    ResourceType, SecretField, Task, TaskKind, TaskUpdate, TelegrafConfig, TelegrafUpdate,
    Variable, VariableUpdate,
};

use crate::clone::FIND_LIMIT_LARGE;
use crate::error::{error_strings, ApplyError, ApplyFailure, FailureGroup, PackError};
use crate::package::{ApplyOpts, EndpointSecretRefs, LiveResource, Pkg};
use crate::resolve;
use crate::rollback::{Applier, ApplyUnit, Rollback, RollbackCoordinator};
use crate::service::Service;
use crate::summary::Summary;

impl Service {
    /// Apply the package to the org. The package must parse; if it has not
    /// been verified by a dry-run yet, one runs here first. On any tier
    /// failure the recorded writes are rolled back and the aggregate error
    /// is returned.
    pub async fn apply(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        pkg: &mut Pkg,
        opts: ApplyOpts,
    ) -> Result<Summary, PackError> {
        pkg.apply_env_refs(&opts.env_refs)
            .map_err(PackError::Validation)?;
        if !pkg.is_parsed() {
            pkg.validate().map_err(PackError::Validation)?;
        }

        if !pkg.is_verified() {
            let outcome = self.dry_run_inner(org_id, user_id, pkg, &opts).await?;
            if let Some(issues) = outcome.issues {
                return Err(issues);
            }
        }

        let mut coordinator = RollbackCoordinator::new(self.apply_req_limit);
        match self
            .run_tiers(org_id, user_id, pkg, &opts, &mut coordinator)
            .await
        {
            Ok(()) => {
                coordinator.disarm();
                pkg.apply_secrets(&opts.missing_secrets);
                tracing::info!(org = %org_id, resources = pkg.resource_count(), "package applied");
                Ok(pkg.summary())
            }
            Err(err) => {
                tracing::warn!(org = %org_id, error = %err, "apply failed, rolling back");
                coordinator.rollback().await;
                Err(err)
            }
        }
    }

    async fn run_tiers(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        pkg: &Pkg,
        opts: &ApplyOpts,
        coordinator: &mut RollbackCoordinator,
    ) -> Result<(), PackError> {
        coordinator
            .run_til_end(vec![self.apply_secrets(org_id, &opts.missing_secrets)])
            .await?;

        coordinator
            .run_til_end(vec![self.apply_labels(org_id, pkg)])
            .await?;

        coordinator
            .run_til_end(vec![
                self.apply_variables(org_id, pkg),
                self.apply_buckets(org_id, pkg),
                self.apply_checks(org_id, pkg),
                self.apply_dashboards(org_id, pkg),
                self.apply_endpoints(org_id, pkg),
                self.apply_tasks(org_id, user_id, pkg),
                self.apply_telegrafs(org_id, pkg),
            ])
            .await?;

        // Rules bind against endpoints that now all have IDs.
        let rules = self.rules_applier(org_id, pkg).await?;
        coordinator.run_til_end(vec![rules]).await?;

        coordinator
            .run_til_end(vec![self.apply_label_mappings(pkg)])
            .await?;

        Ok(())
    }

    // ── tier 0: secrets ─────────────────────────────────────────────────

    fn apply_secrets(&self, org_id: Uuid, secrets: &BTreeMap<String, String>) -> Applier {
        const RESOURCE: &str = "secrets";

        if secrets.is_empty() {
            return Applier {
                resource: RESOURCE,
                units: Vec::new(),
                rollback: Rollback::noop(RESOURCE),
            };
        }

        let rollback_log: Arc<Mutex<Vec<String>>> = Arc::default();
        let svc = Arc::clone(&self.platform.secrets);
        let log = Arc::clone(&rollback_log);
        let secrets = secrets.clone();

        let unit = ApplyUnit {
            name: RESOURCE.to_string(),
            fut: Box::pin(async move {
                let keys: Vec<String> = secrets.keys().cloned().collect();
                match svc.put_secrets(org_id, secrets).await {
                    Ok(()) => {
                        log.lock().unwrap().extend(keys);
                        None
                    }
                    Err(err) => Some(ApplyFailure {
                        name: RESOURCE.to_string(),
                        msg: err.to_string(),
                    }),
                }
            }),
        };

        let svc = Arc::clone(&self.platform.secrets);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let keys = std::mem::take(&mut *rollback_log.lock().unwrap());
                if keys.is_empty() {
                    return Ok(());
                }
                svc.delete_secrets(org_id, keys)
                    .await
                    .map_err(|e| format!("unable to delete secrets: {e}"))
            })
        });

        Applier {
            resource: RESOURCE,
            units: vec![unit],
            rollback,
        }
    }

    // ── tier 1: labels ──────────────────────────────────────────────────

    fn apply_labels(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "label";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<Label>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.labels().len());

        for decl in pkg.labels() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.labels);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Label, &name) {
                        Some(LiveResource::Label(l)) => Some(l),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                LabelUpdate {
                                    properties: Some(LabelProperties {
                                        color: spec.color.clone(),
                                        description: spec.description.clone(),
                                    }),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(Label {
                                id: Uuid::nil(),
                                org_id,
                                name: name.clone(),
                                properties: LabelProperties {
                                    color: spec.color.clone(),
                                    description: spec.description.clone(),
                                },
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Label, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.labels);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                LabelUpdate {
                                    properties: Some(prev.properties),
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    // ── tier 2: primary resources ───────────────────────────────────────

    fn apply_buckets(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "bucket";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<Bucket>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.buckets().len());

        for decl in pkg.buckets() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.buckets);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Bucket, &name) {
                        Some(LiveResource::Bucket(b)) => Some(b),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                BucketUpdate {
                                    description: Some(spec.description.clone()),
                                    retention_seconds: Some(spec.retention_seconds),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(Bucket {
                                id: Uuid::nil(),
                                org_id,
                                name: name.clone(),
                                description: spec.description.clone(),
                                retention_seconds: spec.retention_seconds,
                                kind: BucketKind::User,
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Bucket, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.buckets);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                BucketUpdate {
                                    description: Some(prev.description),
                                    retention_seconds: Some(prev.retention_seconds),
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    fn apply_checks(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "check";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<Check>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.checks().len());

        for decl in pkg.checks() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.checks);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Check, &name) {
                        Some(LiveResource::Check(c)) => Some(c),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                CheckUpdate {
                                    description: Some(spec.description.clone()),
                                    status: Some(spec.status),
                                    query: Some(spec.query.clone()),
                                    every: Some(spec.every.clone()),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(Check {
                                id: Uuid::nil(),
                                org_id,
                                task_id: Uuid::nil(),
                                name: name.clone(),
                                description: spec.description.clone(),
                                status: spec.status,
                                query: spec.query.clone(),
                                every: spec.every.clone(),
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Check, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.checks);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                CheckUpdate {
                                    description: Some(prev.description),
                                    status: Some(prev.status),
                                    query: Some(prev.query),
                                    every: Some(prev.every),
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    fn apply_dashboards(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "dashboard";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<Dashboard>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.dashboards().len());

        for decl in pkg.dashboards() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.dashboards);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Dashboard, &name) {
                        Some(LiveResource::Dashboard(d)) => Some(d),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                DashboardUpdate {
                                    description: Some(spec.description.clone()),
                                    cells: Some(spec.cells.clone()),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(Dashboard {
                                id: Uuid::nil(),
                                org_id,
                                name: name.clone(),
                                description: spec.description.clone(),
                                cells: spec.cells.clone(),
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Dashboard, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.dashboards);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                DashboardUpdate {
                                    description: Some(prev.description),
                                    cells: Some(prev.cells),
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    fn apply_endpoints(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "notification_endpoint";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<NotificationEndpoint>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.endpoints().len());

        for decl in pkg.endpoints() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.endpoints);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::NotificationEndpoint, &name)
                    {
                        Some(LiveResource::Endpoint(e)) => Some(e),
                        _ => None,
                    };
                    let declared = NotificationEndpoint {
                        id: existing.as_ref().map(|e| e.id).unwrap_or_else(Uuid::nil),
                        org_id,
                        name: name.clone(),
                        description: spec.description.clone(),
                        status: spec.status,
                        kind: spec.kind,
                        url: spec.url.clone(),
                        routing_key: spec.routing_key.clone().map(|key| SecretField { key }),
                        token: spec.token.clone().map(|key| SecretField { key }),
                        username: spec.username.clone().map(|key| SecretField { key }),
                        password: spec.password.clone().map(|key| SecretField { key }),
                    };
                    let result = match &existing {
                        Some(live) => svc.update(live.id, declared).await,
                        None => svc.create(declared).await,
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(
                                ResourceType::NotificationEndpoint,
                                &name,
                                applied.id,
                            );
                            records.set_endpoint_secrets(
                                &name,
                                secret_refs_by_suffix(&applied),
                            );
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.endpoints);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc.update(id, prev).await.map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    fn apply_tasks(&self, org_id: Uuid, user_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "task";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<Task>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.tasks().len());

        for decl in pkg.tasks() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.tasks);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Task, &name) {
                        Some(LiveResource::Task(t)) => Some(t),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                TaskUpdate {
                                    description: Some(spec.description.clone()),
                                    status: Some(spec.status),
                                    script: Some(spec.script.clone()),
                                    every: spec.every.clone(),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(Task {
                                id: Uuid::nil(),
                                org_id,
                                owner_id: user_id,
                                name: name.clone(),
                                description: spec.description.clone(),
                                kind: TaskKind::System,
                                status: spec.status,
                                script: spec.script.clone(),
                                every: spec.every.clone(),
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Task, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.tasks);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                TaskUpdate {
                                    description: Some(prev.description),
                                    status: Some(prev.status),
                                    script: Some(prev.script),
                                    every: prev.every,
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    fn apply_telegrafs(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "telegraf";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<TelegrafConfig>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.telegrafs().len());

        for decl in pkg.telegrafs() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.telegrafs);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Telegraf, &name) {
                        Some(LiveResource::Telegraf(t)) => Some(t),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                TelegrafUpdate {
                                    description: Some(spec.description.clone()),
                                    config: Some(spec.config.clone()),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(TelegrafConfig {
                                id: Uuid::nil(),
                                org_id,
                                name: name.clone(),
                                description: spec.description.clone(),
                                config: spec.config.clone(),
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Telegraf, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.telegrafs);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                TelegrafUpdate {
                                    description: Some(prev.description),
                                    config: Some(prev.config),
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    fn apply_variables(&self, org_id: Uuid, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "variable";

        let rollback_log: Arc<Mutex<Vec<(Uuid, Option<Variable>)>>> = Arc::default();
        let mut units = Vec::with_capacity(pkg.variables().len());

        for decl in pkg.variables() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            let name = name.to_string();
            let spec = decl.spec.clone();
            let svc = Arc::clone(&self.platform.variables);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let existing = match records.existing(ResourceType::Variable, &name) {
                        Some(LiveResource::Variable(v)) => Some(v),
                        _ => None,
                    };
                    let result = match &existing {
                        Some(live) => {
                            svc.update(
                                live.id,
                                VariableUpdate {
                                    description: Some(spec.description.clone()),
                                    arguments: Some(spec.arguments.clone()),
                                },
                            )
                            .await
                        }
                        None => {
                            svc.create(Variable {
                                id: Uuid::nil(),
                                org_id,
                                name: name.clone(),
                                description: spec.description.clone(),
                                arguments: spec.arguments.clone(),
                            })
                            .await
                        }
                    };
                    match result {
                        Ok(applied) => {
                            records.set_applied(ResourceType::Variable, &name, applied.id);
                            log.lock().unwrap().push((applied.id, existing));
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.variables);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let entries = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for (id, previous) in entries {
                    let result = match previous {
                        Some(prev) => svc
                            .update(
                                id,
                                VariableUpdate {
                                    description: Some(prev.description),
                                    arguments: Some(prev.arguments),
                                },
                            )
                            .await
                            .map(|_| ()),
                        None => svc.delete(id).await,
                    };
                    if result.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }

    // ── tier 3: rules, then label mappings ──────────────────────────────

    /// Bind every rule's endpoint reference before any rule is created.
    /// An unresolved reference fails the whole tier up front.
    async fn rules_applier(&self, org_id: Uuid, pkg: &Pkg) -> Result<Applier, PackError> {
        const RESOURCE: &str = "notification_rule";

        let live = self
            .platform
            .endpoints
            .find_all(org_id, FIND_LIMIT_LARGE)
            .await
            .map_err(|e| PackError::port("listing notification endpoints", e))?;
        let index = resolve::endpoint_index(&live, pkg);

        let mut bound = Vec::new();
        let mut failures = Vec::new();
        for decl in pkg.rules() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            if !decl.should_apply() {
                continue;
            }
            match index.get(&decl.spec.endpoint).and_then(|r| r.id) {
                Some(endpoint_id) => bound.push((name.to_string(), decl.spec.clone(), endpoint_id)),
                None => failures.push(ApplyFailure {
                    name: name.to_string(),
                    msg: format!(
                        "endpoint dependency does not exist; endpoint={:?}",
                        decl.spec.endpoint
                    ),
                }),
            }
        }

        if !failures.is_empty() {
            return Err(PackError::Apply(ApplyError {
                groups: vec![FailureGroup {
                    resource_type: "notification_rules".to_string(),
                    action: error_strings::FIND_DEPENDENCY.to_string(),
                    failures,
                }],
            }));
        }

        let rollback_log: Arc<Mutex<Vec<Uuid>>> = Arc::default();
        let mut units = Vec::with_capacity(bound.len());

        for (name, spec, endpoint_id) in bound {
            let svc = Arc::clone(&self.platform.rules);
            let records = pkg.records();
            let log = Arc::clone(&rollback_log);

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    let result = svc
                        .create(NotificationRule {
                            id: Uuid::nil(),
                            org_id,
                            task_id: Uuid::nil(),
                            endpoint_id,
                            name: name.clone(),
                            description: spec.description.clone(),
                            status: spec.status,
                            every: spec.every.clone(),
                            offset: spec.offset.clone(),
                            message_template: spec.message_template.clone(),
                            status_rules: spec.status_rules.clone(),
                        })
                        .await;
                    match result {
                        Ok(applied) => {
                            records.set_applied(
                                ResourceType::NotificationRule,
                                &name,
                                applied.id,
                            );
                            log.lock().unwrap().push(applied.id);
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.rules);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let ids = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for id in ids {
                    if svc.delete(id).await.is_err() {
                        failed.push(id.to_string());
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Ok(Applier {
            resource: RESOURCE,
            units,
            rollback,
        })
    }

    /// Built after every other tier so both sides of each association have
    /// IDs. Associations found live at dry-run, or with a side that never
    /// materialized, are skipped.
    fn apply_label_mappings(&self, pkg: &Pkg) -> Applier {
        const RESOURCE: &str = "label_mapping";

        let rollback_log: Arc<Mutex<Vec<LabelMapping>>> = Arc::default();
        let mut units = Vec::new();

        for pending in pkg.pending_mappings() {
            if pending.exists {
                continue;
            }
            let (Some(resource_id), Some(label_id)) = (pending.resource_id, pending.label_id)
            else {
                continue;
            };
            let mapping = LabelMapping {
                label_id,
                resource_id,
                resource_type: pending.resource_type,
            };
            let svc = Arc::clone(&self.platform.labels);
            let log = Arc::clone(&rollback_log);
            let name = format!(
                "{}:{}:{}",
                pending.resource_type, pending.resource_name, pending.label_name
            );

            units.push(ApplyUnit {
                name: name.clone(),
                fut: Box::pin(async move {
                    match svc.create_mapping(mapping).await {
                        Ok(()) => {
                            log.lock().unwrap().push(mapping);
                            None
                        }
                        Err(err) => Some(ApplyFailure {
                            name,
                            msg: err.to_string(),
                        }),
                    }
                }),
            });
        }

        let svc = Arc::clone(&self.platform.labels);
        let rollback = Rollback::new(RESOURCE, move || {
            Box::pin(async move {
                let mappings = std::mem::take(&mut *rollback_log.lock().unwrap());
                let mut failed = Vec::new();
                for mapping in mappings {
                    if svc.delete_mapping(mapping).await.is_err() {
                        failed.push(format!("{}:{}", mapping.label_id, mapping.resource_id));
                    }
                }
                rollback_result(RESOURCE, failed)
            })
        });

        Applier {
            resource: RESOURCE,
            units,
            rollback,
        }
    }
}

/// Match platform-resolved secret keys back to endpoint credential slots.
fn secret_refs_by_suffix(endpoint: &NotificationEndpoint) -> EndpointSecretRefs {
    let mut refs = EndpointSecretRefs::default();
    for field in endpoint.secret_fields() {
        if field.key.ends_with("-routing-key") {
            refs.routing_key = Some(field.key);
        } else if field.key.ends_with("-token") {
            refs.token = Some(field.key);
        } else if field.key.ends_with("-username") {
            refs.username = Some(field.key);
        } else if field.key.ends_with("-password") {
            refs.password = Some(field.key);
        }
    }
    refs
}

fn rollback_result(resource: &str, failed: Vec<String>) -> Result<(), String> {
    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{resource}_ids=[{}] unable to restore prior state",
            failed.join(", ")
        ))
    }
}
