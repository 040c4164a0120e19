//! The dry-run engine: look up every declared resource's live counterpart,
//! record what was found, and emit the diff an apply would enact. Also the
//! precondition for apply — a package must be verified by a dry-run first.
//!
//! A lookup that fails is a failed dry-run. Only a clean "not found" makes
//! a resource new.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use lumen_core::models::{NotificationEndpoint, ResourceType};

use crate::clone::FIND_LIMIT_LARGE;
use crate::diff::{
    sort_label_mappings, BucketFields, CheckFields, DashboardFields, Diff, DiffBucket, DiffCheck,
    DiffDashboard, DiffLabel, DiffLabelMapping, DiffNotificationEndpoint, DiffNotificationRule,
    DiffTask, DiffTelegraf, DiffVariable, EndpointFields, LabelFields, RuleFields, TaskFields,
    TelegrafFields, VariableFields,
};
use crate::error::{error_strings, ApplyError, ApplyFailure, FailureGroup, PackError, ValidationErrors};
use crate::package::{ApplyOpts, LiveResource, Pkg};
use crate::resolve;
use crate::service::{DryRunOutcome, Service};

impl Service {
    /// Diff the package against the org's live state and mark it verified.
    /// The package is always marked verified — even when `issues` is
    /// populated — so a caller who accepts the issues can proceed to apply
    /// without a second dry-run.
    pub async fn dry_run(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        pkg: &mut Pkg,
        opts: ApplyOpts,
    ) -> Result<DryRunOutcome, PackError> {
        self.dry_run_inner(org_id, user_id, pkg, &opts).await
    }

    pub(crate) async fn dry_run_inner(
        &self,
        org_id: Uuid,
        _user_id: Uuid,
        pkg: &mut Pkg,
        opts: &ApplyOpts,
    ) -> Result<DryRunOutcome, PackError> {
        let mut issues = ValidationErrors::default();
        if let Err(errs) = pkg.apply_env_refs(&opts.env_refs) {
            issues.issues.extend(errs.issues);
        }
        if !pkg.is_parsed() {
            if let Err(errs) = pkg.validate() {
                issues.issues.extend(errs.issues);
            }
        }

        self.dry_run_secrets(org_id, pkg).await?;

        let mut diff = Diff {
            buckets: self.dry_run_buckets(org_id, pkg).await?,
            checks: self.dry_run_checks(org_id, pkg).await?,
            dashboards: self.dry_run_dashboards(org_id, pkg).await?,
            labels: self.dry_run_labels(org_id, pkg).await?,
            tasks: self.dry_run_tasks(org_id, pkg).await?,
            telegraf_configs: self.dry_run_telegrafs(org_id, pkg).await?,
            variables: self.dry_run_variables(org_id, pkg).await?,
            ..Diff::default()
        };

        // Endpoints and rules share one bulk fetch; both match in memory.
        let live_endpoints = self
            .platform
            .endpoints
            .find_all(org_id, FIND_LIMIT_LARGE)
            .await
            .map_err(|e| PackError::port("listing notification endpoints", e))?;
        diff.notification_endpoints = dry_run_endpoints(&live_endpoints, pkg);

        let mut unresolved = None;
        match dry_run_rules(&live_endpoints, pkg) {
            Ok(rules) => diff.notification_rules = rules,
            Err(err) => unresolved = Some(err),
        }

        diff.label_mappings = self.dry_run_label_mappings(pkg).await?;

        pkg.mark_verified();

        let issues = if !issues.is_empty() {
            Some(PackError::Validation(issues))
        } else {
            unresolved.map(PackError::Apply)
        };

        Ok(DryRunOutcome {
            summary: pkg.summary(),
            diff,
            issues,
        })
    }

    /// Mark each referenced secret key that already exists on the org.
    /// Missing keys are not an error here; they must arrive with apply.
    async fn dry_run_secrets(&self, org_id: Uuid, pkg: &mut Pkg) -> Result<(), PackError> {
        if pkg.secret_keys().is_empty() {
            return Ok(());
        }
        let live = self
            .platform
            .secrets
            .secret_keys(org_id)
            .await
            .map_err(|e| PackError::port("listing secret keys", e))?;
        for key in live {
            pkg.set_secret_live(&key);
        }
        Ok(())
    }

    async fn dry_run_buckets(
        &self,
        org_id: Uuid,
        pkg: &Pkg,
    ) -> Result<Vec<DiffBucket>, PackError> {
        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.buckets() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let existing = self
                .platform
                .buckets
                .find_by_name(org_id, name)
                .await
                .map_err(|e| PackError::port("looking up bucket", e))?;
            let new = BucketFields {
                description: decl.spec.description.clone(),
                retention_seconds: decl.spec.retention_seconds,
            };
            let diff = match existing {
                Some(live) => {
                    let diff = DiffBucket {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(BucketFields {
                            description: live.description.clone(),
                            retention_seconds: live.retention_seconds,
                        }),
                        new,
                    };
                    records.set_existing(ResourceType::Bucket, name, LiveResource::Bucket(live));
                    diff
                }
                None => DiffBucket {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    async fn dry_run_checks(&self, org_id: Uuid, pkg: &Pkg) -> Result<Vec<DiffCheck>, PackError> {
        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.checks() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let existing = self
                .platform
                .checks
                .find_by_name(org_id, name)
                .await
                .map_err(|e| PackError::port("looking up check", e))?;
            let new = CheckFields {
                description: decl.spec.description.clone(),
                status: decl.spec.status,
                query: decl.spec.query.clone(),
                every: decl.spec.every.clone(),
            };
            let diff = match existing {
                Some(live) => {
                    let diff = DiffCheck {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(CheckFields {
                            description: live.description.clone(),
                            status: live.status,
                            query: live.query.clone(),
                            every: live.every.clone(),
                        }),
                        new,
                    };
                    records.set_existing(ResourceType::Check, name, LiveResource::Check(live));
                    diff
                }
                None => DiffCheck {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    async fn dry_run_dashboards(
        &self,
        org_id: Uuid,
        pkg: &Pkg,
    ) -> Result<Vec<DiffDashboard>, PackError> {
        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.dashboards() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let existing = self
                .platform
                .dashboards
                .find_by_name(org_id, name)
                .await
                .map_err(|e| PackError::port("looking up dashboard", e))?;
            let new = DashboardFields {
                description: decl.spec.description.clone(),
                cells: decl.spec.cells.clone(),
            };
            let diff = match existing {
                Some(live) => {
                    let diff = DiffDashboard {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(DashboardFields {
                            description: live.description.clone(),
                            cells: live.cells.clone(),
                        }),
                        new,
                    };
                    records.set_existing(
                        ResourceType::Dashboard,
                        name,
                        LiveResource::Dashboard(live),
                    );
                    diff
                }
                None => DiffDashboard {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    async fn dry_run_labels(&self, org_id: Uuid, pkg: &Pkg) -> Result<Vec<DiffLabel>, PackError> {
        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.labels() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let existing = self
                .platform
                .labels
                .find_by_name(org_id, name)
                .await
                .map_err(|e| PackError::port("looking up label", e))?;
            let new = LabelFields {
                color: decl.spec.color.clone(),
                description: decl.spec.description.clone(),
            };
            let diff = match existing {
                Some(live) => {
                    let diff = DiffLabel {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(LabelFields {
                            color: live.properties.color.clone(),
                            description: live.properties.description.clone(),
                        }),
                        new,
                    };
                    records.set_existing(ResourceType::Label, name, LiveResource::Label(live));
                    diff
                }
                None => DiffLabel {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    async fn dry_run_tasks(&self, org_id: Uuid, pkg: &Pkg) -> Result<Vec<DiffTask>, PackError> {
        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.tasks() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let existing = self
                .platform
                .tasks
                .find_by_name(org_id, name)
                .await
                .map_err(|e| PackError::port("looking up task", e))?;
            let new = TaskFields {
                description: decl.spec.description.clone(),
                status: decl.spec.status,
                script: decl.spec.script.clone(),
                every: decl.spec.every.clone(),
            };
            let diff = match existing {
                Some(live) => {
                    let diff = DiffTask {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(TaskFields {
                            description: live.description.clone(),
                            status: live.status,
                            script: live.script.clone(),
                            every: live.every.clone(),
                        }),
                        new,
                    };
                    records.set_existing(ResourceType::Task, name, LiveResource::Task(live));
                    diff
                }
                None => DiffTask {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    async fn dry_run_telegrafs(
        &self,
        org_id: Uuid,
        pkg: &Pkg,
    ) -> Result<Vec<DiffTelegraf>, PackError> {
        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.telegrafs() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let existing = self
                .platform
                .telegrafs
                .find_by_name(org_id, name)
                .await
                .map_err(|e| PackError::port("looking up telegraf config", e))?;
            let new = TelegrafFields {
                description: decl.spec.description.clone(),
                config: decl.spec.config.clone(),
            };
            let diff = match existing {
                Some(live) => {
                    let diff = DiffTelegraf {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(TelegrafFields {
                            description: live.description.clone(),
                            config: live.config.clone(),
                        }),
                        new,
                    };
                    records.set_existing(
                        ResourceType::Telegraf,
                        name,
                        LiveResource::Telegraf(live),
                    );
                    diff
                }
                None => DiffTelegraf {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    /// Variables only list in bulk; fetch once and match by name.
    async fn dry_run_variables(
        &self,
        org_id: Uuid,
        pkg: &Pkg,
    ) -> Result<Vec<DiffVariable>, PackError> {
        let live = self
            .platform
            .variables
            .find_all(org_id, FIND_LIMIT_LARGE)
            .await
            .map_err(|e| PackError::port("listing variables", e))?;
        let by_name: BTreeMap<&str, _> = live.iter().map(|v| (v.name.as_str(), v)).collect();

        let records = pkg.records();
        let mut diffs = BTreeMap::new();
        for decl in pkg.variables() {
            let Some(name) = decl.resolved_name() else {
                continue;
            };
            let new = VariableFields {
                description: decl.spec.description.clone(),
                arguments: decl.spec.arguments.clone(),
            };
            let diff = match by_name.get(name) {
                Some(&live) => {
                    let diff = DiffVariable {
                        id: Some(live.id),
                        name: name.to_string(),
                        old: Some(VariableFields {
                            description: live.description.clone(),
                            arguments: live.arguments.clone(),
                        }),
                        new,
                    };
                    records.set_existing(
                        ResourceType::Variable,
                        name,
                        LiveResource::Variable(live.clone()),
                    );
                    diff
                }
                None => DiffVariable {
                    id: None,
                    name: name.to_string(),
                    old: None,
                    new,
                },
            };
            diffs.insert(name.to_string(), diff);
        }
        Ok(diffs.into_values().collect())
    }

    /// Label-mapping diffs. For a resource with no live counterpart every
    /// declared association is new; otherwise live associations are
    /// enumerated and matched. Live associations to labels outside the
    /// package are left alone.
    async fn dry_run_label_mappings(
        &self,
        pkg: &Pkg,
    ) -> Result<Vec<DiffLabelMapping>, PackError> {
        let records = pkg.records();
        let mut diffs = Vec::new();

        for (kind, name, labels) in pkg.label_associations() {
            match records.existing(kind, &name) {
                None => {
                    for label in labels {
                        diffs.push(DiffLabelMapping {
                            is_new: true,
                            resource_type: kind,
                            resource_id: None,
                            resource_name: name.clone(),
                            label_id: records
                                .existing(ResourceType::Label, &label)
                                .map(|l| l.id()),
                            label_name: label,
                        });
                    }
                }
                Some(live) => {
                    let live_labels = self
                        .platform
                        .labels
                        .find_resource_labels(live.id(), kind)
                        .await
                        .map_err(|e| PackError::port("listing resource labels", e))?;
                    let mut remaining: BTreeSet<String> = labels.into_iter().collect();
                    for live_label in live_labels {
                        if remaining.remove(&live_label.name) {
                            records.mark_live_mapping(kind, &name, &live_label.name);
                            diffs.push(DiffLabelMapping {
                                is_new: false,
                                resource_type: kind,
                                resource_id: Some(live.id()),
                                resource_name: name.clone(),
                                label_id: Some(live_label.id),
                                label_name: live_label.name,
                            });
                        }
                    }
                    for label in remaining {
                        diffs.push(DiffLabelMapping {
                            is_new: true,
                            resource_type: kind,
                            resource_id: Some(live.id()),
                            resource_name: name.clone(),
                            label_id: records
                                .existing(ResourceType::Label, &label)
                                .map(|l| l.id()),
                            label_name: label,
                        });
                    }
                }
            }
        }

        sort_label_mappings(&mut diffs);
        Ok(diffs)
    }
}

fn dry_run_endpoints(
    live_endpoints: &[NotificationEndpoint],
    pkg: &Pkg,
) -> Vec<DiffNotificationEndpoint> {
    let by_name: BTreeMap<&str, &NotificationEndpoint> = live_endpoints
        .iter()
        .map(|e| (e.name.as_str(), e))
        .collect();

    let records = pkg.records();
    let mut diffs = BTreeMap::new();
    for decl in pkg.endpoints() {
        let Some(name) = decl.resolved_name() else {
            continue;
        };
        let new = EndpointFields {
            kind: decl.spec.kind,
            description: decl.spec.description.clone(),
            status: decl.spec.status,
            url: decl.spec.url.clone(),
        };
        let diff = match by_name.get(name) {
            Some(&live) => {
                let diff = DiffNotificationEndpoint {
                    id: Some(live.id),
                    name: name.to_string(),
                    old: Some(EndpointFields {
                        kind: live.kind,
                        description: live.description.clone(),
                        status: live.status,
                        url: live.url.clone(),
                    }),
                    new,
                };
                records.set_existing(
                    ResourceType::NotificationEndpoint,
                    name,
                    LiveResource::Endpoint(live.clone()),
                );
                diff
            }
            None => DiffNotificationEndpoint {
                id: None,
                name: name.to_string(),
                old: None,
                new,
            },
        };
        diffs.insert(name.to_string(), diff);
    }
    diffs.into_values().collect()
}

/// Rule diffs bind to the live endpoint under the referenced name when one
/// exists, else to the package declaration. A reference satisfied by
/// neither fails the dry-run.
fn dry_run_rules(
    live_endpoints: &[NotificationEndpoint],
    pkg: &Pkg,
) -> Result<Vec<DiffNotificationRule>, ApplyError> {
    let index = resolve::endpoint_index(live_endpoints, pkg);

    let mut diffs = Vec::new();
    let mut failures = Vec::new();
    for decl in pkg.rules() {
        let Some(name) = decl.resolved_name() else {
            continue;
        };
        match index.get(&decl.spec.endpoint) {
            Some(resolved) => diffs.push(DiffNotificationRule {
                name: name.to_string(),
                endpoint_name: decl.spec.endpoint.clone(),
                endpoint_id: resolved.id,
                endpoint_kind: resolved.kind,
                new: RuleFields {
                    description: decl.spec.description.clone(),
                    status: decl.spec.status,
                    every: decl.spec.every.clone(),
                    offset: decl.spec.offset.clone(),
                    message_template: decl.spec.message_template.clone(),
                    status_rules: decl.spec.status_rules.clone(),
                },
            }),
            None => failures.push(ApplyFailure {
                name: name.to_string(),
                msg: format!(
                    "notification endpoint {:?} is not in the package or on the platform",
                    decl.spec.endpoint
                ),
            }),
        }
    }

    if failures.is_empty() {
        Ok(diffs)
    } else {
        Err(ApplyError {
            groups: vec![FailureGroup {
                resource_type: "notification_rules".to_string(),
                action: error_strings::FIND_DEPENDENCY.to_string(),
                failures,
            }],
        })
    }
}
