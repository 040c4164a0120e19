//! Package export: enumerate an org's live resources and turn them back
//! into a package document (the inverse of apply).

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use lumen_core::models::{
    Bucket, BucketKind, Check, Dashboard, Label, NotificationEndpoint, NotificationRule,
    ResourceType, Task, TaskKind, TelegrafConfig, Variable,
};

use crate::error::PackError;
use crate::package::{
    Association, BucketSpec, CheckSpec, DashboardSpec, LabelSpec, NotificationEndpointSpec,
    NotificationRuleSpec, ObjectSpec, Pkg, PkgDocument, PkgObject, TaskSpec, TelegrafSpec,
    VariableSpec,
};
use crate::service::Service;
use crate::API_VERSION;

/// Listing limit for kinds that can run long (labels, variables, and the
/// bulk-only services).
pub(crate) const FIND_LIMIT_LARGE: usize = 10_000;

/// Dashboards are heavyweight; cloning takes the first page only.
const CLONE_DASHBOARD_LIMIT: usize = 100;

/// Kinds enumerated when no filter is given.
const CLONABLE_KINDS: [ResourceType; 9] = [
    ResourceType::Bucket,
    ResourceType::Check,
    ResourceType::Dashboard,
    ResourceType::Label,
    ResourceType::NotificationEndpoint,
    ResourceType::NotificationRule,
    ResourceType::Task,
    ResourceType::Telegraf,
    ResourceType::Variable,
];

/// A reference to one live resource to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceToClone {
    pub org_id: Uuid,
    pub kind: ResourceType,
    pub id: Uuid,
}

/// What to export: explicit resource references and/or whole-org clones.
#[derive(Debug, Clone, Default)]
pub struct CreateOpt {
    pub org_clones: Vec<CloneByOrg>,
    pub resources: Vec<ResourceToClone>,
}

impl CreateOpt {
    pub fn with_org(mut self, clone: CloneByOrg) -> Self {
        self.org_clones.push(clone);
        self
    }

    pub fn with_resources(
        mut self,
        resources: impl IntoIterator<Item = ResourceToClone>,
    ) -> Self {
        self.resources.extend(resources);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CloneByOrg {
    pub org_id: Uuid,
    /// Keep only resources associated with one of these labels. Empty means
    /// no filtering.
    pub label_names: Vec<String>,
    /// Kinds to enumerate. Empty means all; duplicates collapse.
    pub resource_kinds: Vec<ResourceType>,
}

impl CloneByOrg {
    pub fn new(org_id: Uuid) -> Self {
        CloneByOrg {
            org_id,
            label_names: Vec::new(),
            resource_kinds: Vec::new(),
        }
    }
}

impl Service {
    /// Export a package from live state, per the options. The result
    /// validates as a package (resources optional — an empty export is a
    /// valid, empty package).
    pub async fn create_pkg(&self, opt: CreateOpt) -> Result<Pkg, PackError> {
        let mut exporter = ResourceExporter::new(self);

        for org_clone in &opt.org_clones {
            let refs = self
                .clone_org_resources(org_clone.org_id, &org_clone.resource_kinds)
                .await?;
            exporter.export(refs, &org_clone.label_names).await?;
        }
        exporter.export(opt.resources, &[]).await?;

        let mut pkg = Pkg::from_document(PkgDocument {
            api_version: API_VERSION.to_string(),
            objects: exporter.into_objects(),
        });
        pkg.validate_without_resources()
            .map_err(PackError::Validation)?;
        Ok(pkg)
    }

    async fn clone_org_resources(
        &self,
        org_id: Uuid,
        kinds: &[ResourceType],
    ) -> Result<Vec<ResourceToClone>, PackError> {
        let kinds: Vec<ResourceType> = if kinds.is_empty() {
            CLONABLE_KINDS.to_vec()
        } else {
            let mut seen = BTreeSet::new();
            kinds
                .iter()
                .copied()
                .filter(|k| seen.insert(*k))
                .collect()
        };

        let mut refs = Vec::new();
        for kind in kinds {
            let found = match kind {
                ResourceType::Bucket => self.clone_org_buckets(org_id).await,
                ResourceType::Check => self.clone_org_checks(org_id).await,
                ResourceType::Dashboard => self.clone_org_dashboards(org_id).await,
                ResourceType::Label => self.clone_org_labels(org_id).await,
                ResourceType::NotificationEndpoint => self.clone_org_endpoints(org_id).await,
                ResourceType::NotificationRule => self.clone_org_rules(org_id).await,
                ResourceType::Task => self.clone_org_tasks(org_id).await,
                ResourceType::Telegraf => self.clone_org_telegrafs(org_id).await,
                ResourceType::Variable => self.clone_org_variables(org_id).await,
            }
            .map_err(|e| PackError::port("cloning org resources", e))?;
            refs.extend(found);
        }
        Ok(refs)
    }

    async fn clone_org_buckets(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let buckets = self.platform.buckets.find_all(org_id, FIND_LIMIT_LARGE).await?;
        Ok(buckets
            .into_iter()
            .filter(|b| b.kind != BucketKind::System)
            .map(|b| ResourceToClone {
                org_id,
                kind: ResourceType::Bucket,
                id: b.id,
            })
            .collect())
    }

    async fn clone_org_checks(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let checks = self.platform.checks.find_all(org_id, FIND_LIMIT_LARGE).await?;
        Ok(checks
            .into_iter()
            .map(|c| ResourceToClone {
                org_id,
                kind: ResourceType::Check,
                id: c.id,
            })
            .collect())
    }

    async fn clone_org_dashboards(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let dashboards = self
            .platform
            .dashboards
            .find_all(org_id, CLONE_DASHBOARD_LIMIT)
            .await?;
        Ok(dashboards
            .into_iter()
            .map(|d| ResourceToClone {
                org_id,
                kind: ResourceType::Dashboard,
                id: d.id,
            })
            .collect())
    }

    async fn clone_org_labels(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let labels = self.platform.labels.find_all(org_id, FIND_LIMIT_LARGE).await?;
        Ok(labels
            .into_iter()
            .map(|l| ResourceToClone {
                org_id,
                kind: ResourceType::Label,
                id: l.id,
            })
            .collect())
    }

    async fn clone_org_endpoints(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let endpoints = self
            .platform
            .endpoints
            .find_all(org_id, FIND_LIMIT_LARGE)
            .await?;
        Ok(endpoints
            .into_iter()
            .map(|e| ResourceToClone {
                org_id,
                kind: ResourceType::NotificationEndpoint,
                id: e.id,
            })
            .collect())
    }

    async fn clone_org_rules(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let rules = self.platform.rules.find_all(org_id, FIND_LIMIT_LARGE).await?;
        Ok(rules
            .into_iter()
            .map(|r| ResourceToClone {
                org_id,
                kind: ResourceType::NotificationRule,
                id: r.id,
            })
            .collect())
    }

    /// Only user-created system tasks are cloned. Checks and rules allocate
    /// their own backing tasks; exporting those would duplicate them on the
    /// next apply.
    async fn clone_org_tasks(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let tasks = self.platform.tasks.find_all(org_id, FIND_LIMIT_LARGE).await?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let checks = self.platform.checks.find_all(org_id, FIND_LIMIT_LARGE).await?;
        let rules = self.platform.rules.find_all(org_id, FIND_LIMIT_LARGE).await?;
        let owned: BTreeSet<Uuid> = checks
            .iter()
            .map(|c| c.task_id)
            .chain(rules.iter().map(|r| r.task_id))
            .collect();

        Ok(tasks
            .into_iter()
            .filter(|t| t.kind == TaskKind::System && !owned.contains(&t.id))
            .map(|t| ResourceToClone {
                org_id,
                kind: ResourceType::Task,
                id: t.id,
            })
            .collect())
    }

    async fn clone_org_telegrafs(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let configs = self
            .platform
            .telegrafs
            .find_all(org_id, FIND_LIMIT_LARGE)
            .await?;
        Ok(configs
            .into_iter()
            .map(|t| ResourceToClone {
                org_id,
                kind: ResourceType::Telegraf,
                id: t.id,
            })
            .collect())
    }

    async fn clone_org_variables(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<ResourceToClone>, crate::ports::PortError> {
        let variables = self
            .platform
            .variables
            .find_all(org_id, FIND_LIMIT_LARGE)
            .await?;
        Ok(variables
            .into_iter()
            .map(|v| ResourceToClone {
                org_id,
                kind: ResourceType::Variable,
                id: v.id,
            })
            .collect())
    }
}

/// Accumulates exported objects, de-duplicated by `(kind, name)`.
struct ResourceExporter<'a> {
    svc: &'a Service,
    objects: BTreeMap<(ResourceType, String), PkgObject>,
}

impl<'a> ResourceExporter<'a> {
    fn new(svc: &'a Service) -> Self {
        ResourceExporter {
            svc,
            objects: BTreeMap::new(),
        }
    }

    fn into_objects(self) -> Vec<PkgObject> {
        self.objects.into_values().collect()
    }

    async fn export(
        &mut self,
        refs: Vec<ResourceToClone>,
        label_filter: &[String],
    ) -> Result<(), PackError> {
        // Group by org and kind so each listing is fetched once.
        let mut grouped: BTreeMap<(Uuid, ResourceType), Vec<Uuid>> = BTreeMap::new();
        for r in refs {
            grouped.entry((r.org_id, r.kind)).or_default().push(r.id);
        }

        for ((org_id, kind), ids) in grouped {
            self.export_kind(org_id, kind, &ids, label_filter).await?;
        }
        Ok(())
    }

    async fn export_kind(
        &mut self,
        org_id: Uuid,
        kind: ResourceType,
        ids: &[Uuid],
        label_filter: &[String],
    ) -> Result<(), PackError> {
        let wanted: BTreeSet<Uuid> = ids.iter().copied().collect();
        let platform = &self.svc.platform;

        match kind {
            ResourceType::Bucket => {
                let found = platform
                    .buckets
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting buckets", e))?;
                for b in found.into_iter().filter(|b| wanted.contains(&b.id)) {
                    self.push_labeled(kind, b.id, bucket_object(&b), label_filter)
                        .await?;
                }
            }
            ResourceType::Check => {
                let found = platform
                    .checks
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting checks", e))?;
                for c in found.into_iter().filter(|c| wanted.contains(&c.id)) {
                    self.push_labeled(kind, c.id, check_object(&c), label_filter)
                        .await?;
                }
            }
            ResourceType::Dashboard => {
                let found = platform
                    .dashboards
                    .find_all(org_id, CLONE_DASHBOARD_LIMIT)
                    .await
                    .map_err(|e| PackError::port("exporting dashboards", e))?;
                for d in found.into_iter().filter(|d| wanted.contains(&d.id)) {
                    self.push_labeled(kind, d.id, dashboard_object(&d), label_filter)
                        .await?;
                }
            }
            ResourceType::Label => {
                let found = platform
                    .labels
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting labels", e))?;
                for l in found.into_iter().filter(|l| wanted.contains(&l.id)) {
                    if !label_filter.is_empty() && !label_filter.contains(&l.name) {
                        continue;
                    }
                    self.push(label_object(&l));
                }
            }
            ResourceType::NotificationEndpoint => {
                let found = platform
                    .endpoints
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting notification endpoints", e))?;
                for e in found.into_iter().filter(|e| wanted.contains(&e.id)) {
                    self.push_labeled(kind, e.id, endpoint_object(&e), label_filter)
                        .await?;
                }
            }
            ResourceType::NotificationRule => {
                let endpoints = platform
                    .endpoints
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting notification endpoints", e))?;
                let endpoint_names: BTreeMap<Uuid, String> =
                    endpoints.iter().map(|e| (e.id, e.name.clone())).collect();
                let found = platform
                    .rules
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting notification rules", e))?;
                for r in found.into_iter().filter(|r| wanted.contains(&r.id)) {
                    let Some(endpoint_name) = endpoint_names.get(&r.endpoint_id) else {
                        return Err(PackError::port(
                            "exporting notification rules",
                            crate::ports::PortError::NotFound(format!(
                                "endpoint {} for rule {:?}",
                                r.endpoint_id, r.name
                            )),
                        ));
                    };
                    self.push_labeled(kind, r.id, rule_object(&r, endpoint_name), label_filter)
                        .await?;
                }
            }
            ResourceType::Task => {
                let found = platform
                    .tasks
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting tasks", e))?;
                for t in found.into_iter().filter(|t| wanted.contains(&t.id)) {
                    self.push_labeled(kind, t.id, task_object(&t), label_filter)
                        .await?;
                }
            }
            ResourceType::Telegraf => {
                let found = platform
                    .telegrafs
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting telegraf configs", e))?;
                for t in found.into_iter().filter(|t| wanted.contains(&t.id)) {
                    self.push_labeled(kind, t.id, telegraf_object(&t), label_filter)
                        .await?;
                }
            }
            ResourceType::Variable => {
                let found = platform
                    .variables
                    .find_all(org_id, FIND_LIMIT_LARGE)
                    .await
                    .map_err(|e| PackError::port("exporting variables", e))?;
                for v in found.into_iter().filter(|v| wanted.contains(&v.id)) {
                    self.push_labeled(kind, v.id, variable_object(&v), label_filter)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Push a non-label object: attach its live label associations, export
    /// those labels alongside it, and apply the label-name filter.
    async fn push_labeled(
        &mut self,
        kind: ResourceType,
        id: Uuid,
        mut object: PkgObject,
        label_filter: &[String],
    ) -> Result<(), PackError> {
        let labels = self
            .svc
            .platform
            .labels
            .find_resource_labels(id, kind)
            .await
            .map_err(|e| PackError::port("listing resource labels", e))?;

        if !label_filter.is_empty()
            && !labels.iter().any(|l| label_filter.contains(&l.name))
        {
            return Ok(());
        }

        for label in &labels {
            self.push(label_object(label));
        }
        object.associations = labels
            .into_iter()
            .map(|l| Association { label: l.name })
            .collect();
        self.push(object);
        Ok(())
    }

    fn push(&mut self, object: PkgObject) {
        let Some(name) = object.name.clone() else {
            return;
        };
        self.objects
            .entry((object.spec.resource_type(), name))
            .or_insert(object);
    }
}

fn plain_object(name: &str, spec: ObjectSpec) -> PkgObject {
    PkgObject {
        name: Some(name.to_string()),
        env_ref: None,
        association_only: false,
        associations: Vec::new(),
        spec,
    }
}

fn bucket_object(b: &Bucket) -> PkgObject {
    plain_object(
        &b.name,
        ObjectSpec::Bucket(BucketSpec {
            description: b.description.clone(),
            retention_seconds: b.retention_seconds,
        }),
    )
}

fn check_object(c: &Check) -> PkgObject {
    plain_object(
        &c.name,
        ObjectSpec::Check(CheckSpec {
            description: c.description.clone(),
            status: c.status,
            query: c.query.clone(),
            every: c.every.clone(),
        }),
    )
}

fn dashboard_object(d: &Dashboard) -> PkgObject {
    plain_object(
        &d.name,
        ObjectSpec::Dashboard(DashboardSpec {
            description: d.description.clone(),
            cells: d.cells.clone(),
        }),
    )
}

fn label_object(l: &Label) -> PkgObject {
    plain_object(
        &l.name,
        ObjectSpec::Label(LabelSpec {
            color: l.properties.color.clone(),
            description: l.properties.description.clone(),
        }),
    )
}

fn endpoint_object(e: &NotificationEndpoint) -> PkgObject {
    plain_object(
        &e.name,
        ObjectSpec::NotificationEndpoint(NotificationEndpointSpec {
            kind: e.kind,
            description: e.description.clone(),
            status: e.status,
            url: e.url.clone(),
            routing_key: e.routing_key.as_ref().map(|f| f.key.clone()),
            token: e.token.as_ref().map(|f| f.key.clone()),
            username: e.username.as_ref().map(|f| f.key.clone()),
            password: e.password.as_ref().map(|f| f.key.clone()),
        }),
    )
}

fn rule_object(r: &NotificationRule, endpoint_name: &str) -> PkgObject {
    plain_object(
        &r.name,
        ObjectSpec::NotificationRule(NotificationRuleSpec {
            endpoint: endpoint_name.to_string(),
            description: r.description.clone(),
            status: r.status,
            every: r.every.clone(),
            offset: r.offset.clone(),
            message_template: r.message_template.clone(),
            status_rules: r.status_rules.clone(),
        }),
    )
}

fn task_object(t: &Task) -> PkgObject {
    plain_object(
        &t.name,
        ObjectSpec::Task(TaskSpec {
            description: t.description.clone(),
            status: t.status,
            script: t.script.clone(),
            every: t.every.clone(),
        }),
    )
}

fn telegraf_object(t: &TelegrafConfig) -> PkgObject {
    plain_object(
        &t.name,
        ObjectSpec::Telegraf(TelegrafSpec {
            description: t.description.clone(),
            config: t.config.clone(),
        }),
    )
}

fn variable_object(v: &Variable) -> PkgObject {
    plain_object(
        &v.name,
        ObjectSpec::Variable(VariableSpec {
            description: v.description.clone(),
            arguments: v.arguments.clone(),
        }),
    )
}
