//! The parsed package: immutable resource declarations plus the mutable
//! reconciliation record the dry-run and apply engines write into.
//!
//! Declarations are keyed by package-name (unique per kind). Reconciliation
//! state — the live counterpart found at dry-run, the platform ID assigned
//! at apply — lives in [`Records`], a mutex-guarded map shared with the
//! concurrent apply units. The mutex is only ever held for short closures,
//! never across a service call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lumen_core::models::{
    Bucket, Cell, Check, Dashboard, EndpointKind, Label, NotificationEndpoint, NotificationRule,
    ResourceType, Status, StatusRule, Task, TelegrafConfig, Variable, VariableArguments,
};

use crate::error::ValidationErrors;
use crate::summary::{
    Summary, SummaryBucket, SummaryCheck, SummaryDashboard, SummaryLabel, SummaryLabelMapping,
    SummaryNotificationEndpoint, SummaryNotificationRule, SummarySecret, SummaryTask,
    SummaryTelegraf, SummaryVariable,
};
use crate::API_VERSION;

/// Options recognized by `dry_run` and `apply`.
#[derive(Debug, Clone, Default)]
pub struct ApplyOpts {
    /// Env-var substitutions for objects declared with `envRef` names.
    pub env_refs: BTreeMap<String, String>,
    /// Secret values to write before anything else is applied.
    pub missing_secrets: BTreeMap<String, String>,
}

// ── wire format ─────────────────────────────────────────────────────────

/// The package document as parsed from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkgDocument {
    pub api_version: String,
    #[serde(default)]
    pub objects: Vec<PkgObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkgObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resolve the object's name from the caller-supplied env refs instead
    /// of declaring it inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_ref: Option<String>,
    /// The object is only in the package to anchor label associations; it is
    /// never created or updated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub association_only: bool,
    /// Labels (by package-name) to associate with this object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<Association>,
    #[serde(flatten)]
    pub spec: ObjectSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ObjectSpec {
    Bucket(BucketSpec),
    Check(CheckSpec),
    Dashboard(DashboardSpec),
    Label(LabelSpec),
    NotificationEndpoint(NotificationEndpointSpec),
    NotificationRule(NotificationRuleSpec),
    Task(TaskSpec),
    Telegraf(TelegrafSpec),
    Variable(VariableSpec),
}

impl ObjectSpec {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ObjectSpec::Bucket(_) => ResourceType::Bucket,
            ObjectSpec::Check(_) => ResourceType::Check,
            ObjectSpec::Dashboard(_) => ResourceType::Dashboard,
            ObjectSpec::Label(_) => ResourceType::Label,
            ObjectSpec::NotificationEndpoint(_) => ResourceType::NotificationEndpoint,
            ObjectSpec::NotificationRule(_) => ResourceType::NotificationRule,
            ObjectSpec::Task(_) => ResourceType::Task,
            ObjectSpec::Telegraf(_) => ResourceType::Telegraf,
            ObjectSpec::Variable(_) => ResourceType::Variable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketSpec {
    pub description: String,
    pub retention_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckSpec {
    pub description: String,
    pub status: Status,
    pub query: String,
    pub every: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSpec {
    pub description: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSpec {
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEndpointSpec {
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub url: String,
    /// Secret-store keys for the endpoint's credential slots.
    #[serde(default)]
    pub routing_key: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRuleSpec {
    /// Package-name of the endpoint the rule delivers to. Resolved against
    /// the union of live and in-package endpoints.
    pub endpoint: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    pub every: String,
    #[serde(default)]
    pub offset: String,
    #[serde(default)]
    pub message_template: String,
    #[serde(default)]
    pub status_rules: Vec<StatusRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskSpec {
    pub description: String,
    pub status: Status,
    pub script: String,
    pub every: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegrafSpec {
    pub description: String,
    pub config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableSpec {
    pub description: String,
    pub arguments: VariableArguments,
}

// ── declarations ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) enum RefName {
    Fixed(String),
    Env { key: String, value: Option<String> },
}

impl RefName {
    pub(crate) fn resolved(&self) -> Option<&str> {
        match self {
            RefName::Fixed(name) => Some(name),
            RefName::Env { value, .. } => value.as_deref(),
        }
    }
}

/// One declared resource: its package-name, label associations, and
/// kind-specific fields.
#[derive(Debug, Clone)]
pub(crate) struct PkgDecl<S> {
    pub name: RefName,
    pub association_only: bool,
    pub labels: Vec<String>,
    pub spec: S,
}

impl<S> PkgDecl<S> {
    pub(crate) fn resolved_name(&self) -> Option<&str> {
        self.name.resolved()
    }

    pub(crate) fn should_apply(&self) -> bool {
        !self.association_only
    }
}

// ── reconciliation records ──────────────────────────────────────────────

/// The live resource captured at dry-run time, kept for diffing and for
/// restoring prior field values on rollback.
#[derive(Debug, Clone)]
pub(crate) enum LiveResource {
    Bucket(Bucket),
    Check(Check),
    Dashboard(Dashboard),
    Label(Label),
    Endpoint(NotificationEndpoint),
    Rule(NotificationRule),
    Task(Task),
    Telegraf(TelegrafConfig),
    Variable(Variable),
}

impl LiveResource {
    pub(crate) fn id(&self) -> Uuid {
        match self {
            LiveResource::Bucket(b) => b.id,
            LiveResource::Check(c) => c.id,
            LiveResource::Dashboard(d) => d.id,
            LiveResource::Label(l) => l.id,
            LiveResource::Endpoint(e) => e.id,
            LiveResource::Rule(r) => r.id,
            LiveResource::Task(t) => t.id,
            LiveResource::Telegraf(t) => t.id,
            LiveResource::Variable(v) => v.id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ResourceRecord {
    /// Live counterpart found at dry-run, if any.
    pub existing: Option<LiveResource>,
    /// Platform ID recorded at apply.
    pub id: Option<Uuid>,
}

/// Secret keys the platform resolved onto an endpoint at apply time,
/// matched back to credential slots by key suffix.
#[derive(Debug, Clone, Default)]
pub(crate) struct EndpointSecretRefs {
    pub routing_key: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default)]
struct RecordsInner {
    records: BTreeMap<(ResourceType, String), ResourceRecord>,
    endpoint_secrets: BTreeMap<String, EndpointSecretRefs>,
    /// `(resource type, resource pkg-name, label pkg-name)` associations
    /// found already present on the platform.
    live_mappings: BTreeSet<(ResourceType, String, String)>,
}

/// Shared handle to the package's reconciliation state. Cloned into every
/// concurrent apply unit.
#[derive(Debug, Clone, Default)]
pub(crate) struct Records {
    inner: Arc<Mutex<RecordsInner>>,
}

impl Records {
    pub(crate) fn set_existing(&self, kind: ResourceType, name: &str, live: LiveResource) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .entry((kind, name.to_string()))
            .or_default()
            .existing = Some(live);
    }

    pub(crate) fn set_applied(&self, kind: ResourceType, name: &str, id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .entry((kind, name.to_string()))
            .or_default()
            .id = Some(id);
    }

    pub(crate) fn existing(&self, kind: ResourceType, name: &str) -> Option<LiveResource> {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .get(&(kind, name.to_string()))
            .and_then(|r| r.existing.clone())
    }

    /// The platform ID this package-name currently maps to: the ID assigned
    /// at apply, falling back to the live ID found at dry-run.
    pub(crate) fn resource_id(&self, kind: ResourceType, name: &str) -> Option<Uuid> {
        let inner = self.inner.lock().unwrap();
        let record = inner.records.get(&(kind, name.to_string()))?;
        record.id.or_else(|| record.existing.as_ref().map(LiveResource::id))
    }

    pub(crate) fn set_endpoint_secrets(&self, name: &str, refs: EndpointSecretRefs) {
        let mut inner = self.inner.lock().unwrap();
        inner.endpoint_secrets.insert(name.to_string(), refs);
    }

    pub(crate) fn endpoint_secrets(&self, name: &str) -> Option<EndpointSecretRefs> {
        let inner = self.inner.lock().unwrap();
        inner.endpoint_secrets.get(name).cloned()
    }

    pub(crate) fn mark_live_mapping(&self, kind: ResourceType, name: &str, label: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .live_mappings
            .insert((kind, name.to_string(), label.to_string()));
    }

    pub(crate) fn is_live_mapping(&self, kind: ResourceType, name: &str, label: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .live_mappings
            .contains(&(kind, name.to_string(), label.to_string()))
    }
}

/// A label association waiting to be written, with whatever IDs are known.
#[derive(Debug, Clone)]
pub(crate) struct PendingMapping {
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub resource_id: Option<Uuid>,
    pub label_name: String,
    pub label_id: Option<Uuid>,
    pub exists: bool,
}

// ── the package ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Pkg {
    api_version: String,
    buckets: Vec<PkgDecl<BucketSpec>>,
    checks: Vec<PkgDecl<CheckSpec>>,
    dashboards: Vec<PkgDecl<DashboardSpec>>,
    labels: Vec<PkgDecl<LabelSpec>>,
    endpoints: Vec<PkgDecl<NotificationEndpointSpec>>,
    rules: Vec<PkgDecl<NotificationRuleSpec>>,
    tasks: Vec<PkgDecl<TaskSpec>>,
    telegrafs: Vec<PkgDecl<TelegrafSpec>>,
    variables: Vec<PkgDecl<VariableSpec>>,
    /// Secret keys referenced by the package, with a liveness flag set at
    /// dry-run.
    secrets: BTreeMap<String, bool>,
    records: Records,
    is_parsed: bool,
    is_verified: bool,
}

impl Pkg {
    pub fn from_document(doc: PkgDocument) -> Pkg {
        let mut pkg = Pkg {
            api_version: doc.api_version,
            buckets: Vec::new(),
            checks: Vec::new(),
            dashboards: Vec::new(),
            labels: Vec::new(),
            endpoints: Vec::new(),
            rules: Vec::new(),
            tasks: Vec::new(),
            telegrafs: Vec::new(),
            variables: Vec::new(),
            secrets: BTreeMap::new(),
            records: Records::default(),
            is_parsed: false,
            is_verified: false,
        };

        for object in doc.objects {
            let name = match (object.name, object.env_ref) {
                (Some(name), _) => RefName::Fixed(name),
                (None, Some(key)) => RefName::Env { key, value: None },
                (None, None) => RefName::Fixed(String::new()),
            };
            let labels = object
                .associations
                .into_iter()
                .map(|a| a.label)
                .collect::<Vec<_>>();

            macro_rules! push {
                ($list:ident, $spec:expr) => {
                    pkg.$list.push(PkgDecl {
                        name,
                        association_only: object.association_only,
                        labels,
                        spec: $spec,
                    })
                };
            }

            match object.spec {
                ObjectSpec::Bucket(spec) => push!(buckets, spec),
                ObjectSpec::Check(spec) => push!(checks, spec),
                ObjectSpec::Dashboard(spec) => push!(dashboards, spec),
                ObjectSpec::Label(spec) => push!(labels, spec),
                ObjectSpec::NotificationEndpoint(spec) => {
                    for key in [&spec.routing_key, &spec.token, &spec.username, &spec.password]
                        .into_iter()
                        .flatten()
                    {
                        pkg.secrets.insert(key.clone(), false);
                    }
                    push!(endpoints, spec)
                }
                ObjectSpec::NotificationRule(spec) => push!(rules, spec),
                ObjectSpec::Task(spec) => push!(tasks, spec),
                ObjectSpec::Telegraf(spec) => push!(telegrafs, spec),
                ObjectSpec::Variable(spec) => push!(variables, spec),
            }
        }

        pkg
    }

    pub fn from_json(raw: &str) -> Result<Pkg, serde_json::Error> {
        Ok(Pkg::from_document(serde_json::from_str(raw)?))
    }

    pub fn is_parsed(&self) -> bool {
        self.is_parsed
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub(crate) fn mark_verified(&mut self) {
        self.is_verified = true;
    }

    /// Resolve env-referenced names from the supplied mapping. Returns the
    /// refs still unresolved afterwards as validation issues.
    pub fn apply_env_refs(
        &mut self,
        env_refs: &BTreeMap<String, String>,
    ) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::default();
        for name in self.ref_names_mut() {
            if let RefName::Env { key, value } = name {
                if value.is_none() {
                    *value = env_refs.get(key.as_str()).cloned();
                }
                if value.is_none() {
                    errs.push(None, Some(key.as_str()), "env reference not resolved");
                }
            }
        }
        errs.into_result()
    }

    fn ref_names_mut(&mut self) -> impl Iterator<Item = &mut RefName> + '_ {
        let Pkg {
            buckets,
            checks,
            dashboards,
            labels,
            endpoints,
            rules,
            tasks,
            telegrafs,
            variables,
            ..
        } = self;
        (buckets.iter_mut().map(|d| &mut d.name))
            .chain(checks.iter_mut().map(|d| &mut d.name))
            .chain(dashboards.iter_mut().map(|d| &mut d.name))
            .chain(labels.iter_mut().map(|d| &mut d.name))
            .chain(endpoints.iter_mut().map(|d| &mut d.name))
            .chain(rules.iter_mut().map(|d| &mut d.name))
            .chain(tasks.iter_mut().map(|d| &mut d.name))
            .chain(telegrafs.iter_mut().map(|d| &mut d.name))
            .chain(variables.iter_mut().map(|d| &mut d.name))
    }

    /// Full validation; a package must declare at least one resource.
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        self.validate_inner(true)
    }

    /// Validation for freshly exported packages, which may be empty.
    pub fn validate_without_resources(&mut self) -> Result<(), ValidationErrors> {
        self.validate_inner(false)
    }

    fn validate_inner(&mut self, require_resources: bool) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::default();

        if self.api_version != API_VERSION {
            errs.push(
                None,
                Some(self.api_version.as_str()),
                format!("api version does not match {API_VERSION:?}"),
            );
        }

        if require_resources && self.resource_count() == 0 {
            errs.push(None, None, "package contains no resources");
        }

        let declared_labels: BTreeSet<&str> = self
            .labels
            .iter()
            .filter_map(|l| l.resolved_name())
            .collect();

        check_kind(&mut errs, "bucket", &declared_labels, &self.buckets);
        check_kind(&mut errs, "check", &declared_labels, &self.checks);
        check_kind(&mut errs, "dashboard", &declared_labels, &self.dashboards);
        check_kind(&mut errs, "label", &declared_labels, &self.labels);
        check_kind(
            &mut errs,
            "notification_endpoint",
            &declared_labels,
            &self.endpoints,
        );
        check_kind(
            &mut errs,
            "notification_rule",
            &declared_labels,
            &self.rules,
        );
        check_kind(&mut errs, "task", &declared_labels, &self.tasks);
        check_kind(&mut errs, "telegraf", &declared_labels, &self.telegrafs);
        check_kind(&mut errs, "variable", &declared_labels, &self.variables);

        for rule in &self.rules {
            if rule.spec.endpoint.is_empty() {
                errs.push(
                    Some("notification_rule"),
                    rule.resolved_name(),
                    "rule does not reference a notification endpoint",
                );
            }
        }

        if errs.is_empty() {
            self.is_parsed = true;
            Ok(())
        } else {
            Err(errs)
        }
    }

    pub fn resource_count(&self) -> usize {
        self.buckets.len()
            + self.checks.len()
            + self.dashboards.len()
            + self.labels.len()
            + self.endpoints.len()
            + self.rules.len()
            + self.tasks.len()
            + self.telegrafs.len()
            + self.variables.len()
    }

    pub(crate) fn buckets(&self) -> &[PkgDecl<BucketSpec>] {
        &self.buckets
    }

    pub(crate) fn checks(&self) -> &[PkgDecl<CheckSpec>] {
        &self.checks
    }

    pub(crate) fn dashboards(&self) -> &[PkgDecl<DashboardSpec>] {
        &self.dashboards
    }

    pub(crate) fn labels(&self) -> &[PkgDecl<LabelSpec>] {
        &self.labels
    }

    pub(crate) fn endpoints(&self) -> &[PkgDecl<NotificationEndpointSpec>] {
        &self.endpoints
    }

    pub(crate) fn rules(&self) -> &[PkgDecl<NotificationRuleSpec>] {
        &self.rules
    }

    pub(crate) fn tasks(&self) -> &[PkgDecl<TaskSpec>] {
        &self.tasks
    }

    pub(crate) fn telegrafs(&self) -> &[PkgDecl<TelegrafSpec>] {
        &self.telegrafs
    }

    pub(crate) fn variables(&self) -> &[PkgDecl<VariableSpec>] {
        &self.variables
    }

    pub(crate) fn records(&self) -> Records {
        self.records.clone()
    }

    pub(crate) fn secret_keys(&self) -> Vec<String> {
        self.secrets.keys().cloned().collect()
    }

    pub(crate) fn set_secret_live(&mut self, key: &str) {
        if let Some(live) = self.secrets.get_mut(key) {
            *live = true;
        }
    }

    /// Mark the referenced keys supplied with this apply as live.
    pub(crate) fn apply_secrets(&mut self, provided: &BTreeMap<String, String>) {
        for key in provided.keys() {
            self.set_secret_live(key);
        }
    }

    /// Every `(kind, pkg-name, associated label names)` triple for labelable
    /// declarations with a resolvable name.
    pub(crate) fn label_associations(&self) -> Vec<(ResourceType, String, Vec<String>)> {
        let mut out = Vec::new();
        let mut collect = |kind: ResourceType, name: Option<&str>, labels: &Vec<String>| {
            if let Some(name) = name {
                if !labels.is_empty() {
                    out.push((kind, name.to_string(), labels.clone()));
                }
            }
        };

        for d in &self.buckets {
            collect(ResourceType::Bucket, d.resolved_name(), &d.labels);
        }
        for d in &self.checks {
            collect(ResourceType::Check, d.resolved_name(), &d.labels);
        }
        for d in &self.dashboards {
            collect(ResourceType::Dashboard, d.resolved_name(), &d.labels);
        }
        for d in &self.endpoints {
            collect(
                ResourceType::NotificationEndpoint,
                d.resolved_name(),
                &d.labels,
            );
        }
        for d in &self.rules {
            collect(ResourceType::NotificationRule, d.resolved_name(), &d.labels);
        }
        for d in &self.tasks {
            collect(ResourceType::Task, d.resolved_name(), &d.labels);
        }
        for d in &self.telegrafs {
            collect(ResourceType::Telegraf, d.resolved_name(), &d.labels);
        }
        for d in &self.variables {
            collect(ResourceType::Variable, d.resolved_name(), &d.labels);
        }
        out
    }

    /// Label associations with the IDs known at this point of the apply.
    /// Associations already live, or with either side's ID unknown, are
    /// marked accordingly so the mapping applier can skip them.
    pub(crate) fn pending_mappings(&self) -> Vec<PendingMapping> {
        let records = &self.records;
        self.label_associations()
            .into_iter()
            .flat_map(|(kind, name, labels)| {
                labels.into_iter().map(move |label| PendingMapping {
                    resource_type: kind,
                    resource_id: records.resource_id(kind, &name),
                    label_id: records.resource_id(ResourceType::Label, &label),
                    exists: records.is_live_mapping(kind, &name, &label),
                    resource_name: name.clone(),
                    label_name: label,
                })
            })
            .collect()
    }

    // ── summary ─────────────────────────────────────────────────────────

    pub fn summary(&self) -> Summary {
        let records = &self.records;
        let mut summary = Summary::default();

        for d in &self.buckets {
            let Some(name) = d.resolved_name() else { continue };
            summary.buckets.push(SummaryBucket {
                id: records.resource_id(ResourceType::Bucket, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                retention_seconds: d.spec.retention_seconds,
                labels: d.labels.clone(),
            });
        }

        for d in &self.checks {
            let Some(name) = d.resolved_name() else { continue };
            summary.checks.push(SummaryCheck {
                id: records.resource_id(ResourceType::Check, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                status: d.spec.status,
                query: d.spec.query.clone(),
                every: d.spec.every.clone(),
                labels: d.labels.clone(),
            });
        }

        for d in &self.dashboards {
            let Some(name) = d.resolved_name() else { continue };
            summary.dashboards.push(SummaryDashboard {
                id: records.resource_id(ResourceType::Dashboard, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                cells: d.spec.cells.clone(),
                labels: d.labels.clone(),
            });
        }

        for d in &self.labels {
            let Some(name) = d.resolved_name() else { continue };
            summary.labels.push(SummaryLabel {
                id: records.resource_id(ResourceType::Label, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                color: d.spec.color.clone(),
                description: d.spec.description.clone(),
            });
        }

        for d in &self.endpoints {
            let Some(name) = d.resolved_name() else { continue };
            let resolved = records.endpoint_secrets(name).unwrap_or_default();
            summary.notification_endpoints.push(SummaryNotificationEndpoint {
                id: records.resource_id(ResourceType::NotificationEndpoint, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                status: d.spec.status,
                kind: d.spec.kind,
                url: d.spec.url.clone(),
                routing_key: resolved.routing_key.or_else(|| d.spec.routing_key.clone()),
                token: resolved.token.or_else(|| d.spec.token.clone()),
                username: resolved.username.or_else(|| d.spec.username.clone()),
                password: resolved.password.or_else(|| d.spec.password.clone()),
                labels: d.labels.clone(),
            });
        }

        for d in &self.rules {
            let Some(name) = d.resolved_name() else { continue };
            summary.notification_rules.push(SummaryNotificationRule {
                id: records.resource_id(ResourceType::NotificationRule, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                status: d.spec.status,
                endpoint_name: d.spec.endpoint.clone(),
                endpoint_id: records
                    .resource_id(ResourceType::NotificationEndpoint, &d.spec.endpoint),
                every: d.spec.every.clone(),
                offset: d.spec.offset.clone(),
                message_template: d.spec.message_template.clone(),
                status_rules: d.spec.status_rules.clone(),
                labels: d.labels.clone(),
            });
        }

        for d in &self.tasks {
            let Some(name) = d.resolved_name() else { continue };
            summary.tasks.push(SummaryTask {
                id: records.resource_id(ResourceType::Task, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                status: d.spec.status,
                script: d.spec.script.clone(),
                every: d.spec.every.clone(),
                labels: d.labels.clone(),
            });
        }

        for d in &self.telegrafs {
            let Some(name) = d.resolved_name() else { continue };
            summary.telegraf_configs.push(SummaryTelegraf {
                id: records.resource_id(ResourceType::Telegraf, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                config: d.spec.config.clone(),
                labels: d.labels.clone(),
            });
        }

        for d in &self.variables {
            let Some(name) = d.resolved_name() else { continue };
            summary.variables.push(SummaryVariable {
                id: records.resource_id(ResourceType::Variable, name),
                pkg_name: name.to_string(),
                name: name.to_string(),
                description: d.spec.description.clone(),
                arguments: d.spec.arguments.clone(),
                labels: d.labels.clone(),
            });
        }

        summary.secrets = self
            .secrets
            .iter()
            .map(|(key, live)| SummarySecret {
                key: key.clone(),
                live: *live,
            })
            .collect();

        summary.buckets.sort_by(|a, b| a.name.cmp(&b.name));
        summary.checks.sort_by(|a, b| a.name.cmp(&b.name));
        summary.dashboards.sort_by(|a, b| a.name.cmp(&b.name));
        summary.labels.sort_by(|a, b| a.name.cmp(&b.name));
        summary
            .notification_endpoints
            .sort_by(|a, b| a.name.cmp(&b.name));
        summary
            .notification_rules
            .sort_by(|a, b| a.name.cmp(&b.name));
        summary.tasks.sort_by(|a, b| a.name.cmp(&b.name));
        summary.telegraf_configs.sort_by(|a, b| a.name.cmp(&b.name));
        summary.variables.sort_by(|a, b| a.name.cmp(&b.name));

        summary.label_mappings = self
            .pending_mappings()
            .into_iter()
            .map(|m| SummaryLabelMapping {
                exists: m.exists,
                resource_type: m.resource_type,
                resource_id: m.resource_id,
                resource_name: m.resource_name,
                label_id: m.label_id,
                label_name: m.label_name,
            })
            .collect();
        summary.label_mappings.sort_by(|a, b| {
            (a.resource_type, &a.resource_name, &a.label_name)
                .cmp(&(b.resource_type, &b.resource_name, &b.label_name))
        });

        summary
    }
}

fn check_kind<S>(
    errs: &mut ValidationErrors,
    kind: &'static str,
    declared_labels: &BTreeSet<&str>,
    decls: &[PkgDecl<S>],
) {
    let mut seen = BTreeSet::new();
    for decl in decls {
        match decl.resolved_name() {
            None | Some("") => {
                let key = match &decl.name {
                    RefName::Env { key, .. } => Some(key.as_str()),
                    RefName::Fixed(_) => None,
                };
                errs.push(Some(kind), key, "object has no resolvable name");
            }
            Some(name) => {
                if !seen.insert(name) {
                    errs.push(Some(kind), Some(name), "duplicate name");
                }
            }
        }
        for label in &decl.labels {
            if kind != "label" && !declared_labels.contains(label.as_str()) {
                errs.push(
                    Some(kind),
                    decl.resolved_name(),
                    format!("association references label {label:?} not declared in package"),
                );
            }
        }
    }
}
