//! What a dry-run found: per-kind lists of `{pkgName, old?, new}` entries,
//! plus label-mapping rows. An entry with no `old` side will be created by
//! apply; an entry with one will be updated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lumen_core::models::{
    Cell, EndpointKind, ResourceType, Status, StatusRule, VariableArguments,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub buckets: Vec<DiffBucket>,
    pub checks: Vec<DiffCheck>,
    pub dashboards: Vec<DiffDashboard>,
    pub labels: Vec<DiffLabel>,
    pub label_mappings: Vec<DiffLabelMapping>,
    pub notification_endpoints: Vec<DiffNotificationEndpoint>,
    pub notification_rules: Vec<DiffNotificationRule>,
    pub tasks: Vec<DiffTask>,
    pub telegraf_configs: Vec<DiffTelegraf>,
    pub variables: Vec<DiffVariable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffBucket {
    /// Live ID, when the bucket already exists.
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<BucketFields>,
    pub new: BucketFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketFields {
    pub description: String,
    pub retention_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffCheck {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<CheckFields>,
    pub new: CheckFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFields {
    pub description: String,
    pub status: Status,
    pub query: String,
    pub every: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffDashboard {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<DashboardFields>,
    pub new: DashboardFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFields {
    pub description: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLabel {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<LabelFields>,
    pub new: LabelFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFields {
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLabelMapping {
    pub is_new: bool,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub resource_name: String,
    pub label_id: Option<Uuid>,
    pub label_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffNotificationEndpoint {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<EndpointFields>,
    pub new: EndpointFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointFields {
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    pub description: String,
    pub status: Status,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffNotificationRule {
    pub name: String,
    /// The endpoint the rule will bind to: the live endpoint under the
    /// referenced name when present, otherwise the package declaration.
    pub endpoint_name: String,
    pub endpoint_id: Option<Uuid>,
    pub endpoint_kind: EndpointKind,
    pub new: RuleFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFields {
    pub description: String,
    pub status: Status,
    pub every: String,
    pub offset: String,
    pub message_template: String,
    pub status_rules: Vec<StatusRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffTask {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<TaskFields>,
    pub new: TaskFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    pub description: String,
    pub status: Status,
    pub script: String,
    pub every: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffTelegraf {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<TelegrafFields>,
    pub new: TelegrafFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegrafFields {
    pub description: String,
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffVariable {
    pub id: Option<Uuid>,
    pub name: String,
    pub old: Option<VariableFields>,
    pub new: VariableFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableFields {
    pub description: String,
    pub arguments: VariableArguments,
}

/// Order label-mapping rows by resource type, then resource name, then label
/// name. The per-kind lists are sorted by name where they are built.
pub(crate) fn sort_label_mappings(mappings: &mut [DiffLabelMapping]) {
    mappings.sort_by(|a, b| {
        (a.resource_type, &a.resource_name, &a.label_name)
            .cmp(&(b.resource_type, &b.resource_name, &b.label_name))
    });
}
