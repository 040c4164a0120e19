//! Post-apply (and post-dry-run) view of a package: every declared resource
//! with the platform ID it resolved to, plus secret liveness and resolved
//! label mappings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lumen_core::models::{
    Cell, EndpointKind, ResourceType, Status, StatusRule, VariableArguments,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub buckets: Vec<SummaryBucket>,
    pub checks: Vec<SummaryCheck>,
    pub dashboards: Vec<SummaryDashboard>,
    pub labels: Vec<SummaryLabel>,
    pub label_mappings: Vec<SummaryLabelMapping>,
    pub notification_endpoints: Vec<SummaryNotificationEndpoint>,
    pub notification_rules: Vec<SummaryNotificationRule>,
    pub secrets: Vec<SummarySecret>,
    pub tasks: Vec<SummaryTask>,
    pub telegraf_configs: Vec<SummaryTelegraf>,
    pub variables: Vec<SummaryVariable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBucket {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub retention_seconds: u64,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCheck {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub query: String,
    pub every: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDashboard {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub cells: Vec<Cell>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLabel {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLabelMapping {
    /// True when the association was already present on the platform.
    pub exists: bool,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub resource_name: String,
    pub label_id: Option<Uuid>,
    pub label_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryNotificationEndpoint {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    pub url: String,
    pub routing_key: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryNotificationRule {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    /// Package-name of the endpoint the rule delivers to.
    pub endpoint_name: String,
    pub endpoint_id: Option<Uuid>,
    pub every: String,
    pub offset: String,
    pub message_template: String,
    pub status_rules: Vec<StatusRule>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySecret {
    pub key: String,
    /// True when the key already exists on the platform (or was supplied
    /// with this apply).
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTask {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub script: String,
    pub every: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTelegraf {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub config: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryVariable {
    pub id: Option<Uuid>,
    pub pkg_name: String,
    pub name: String,
    pub description: String,
    pub arguments: VariableArguments,
    pub labels: Vec<String>,
}
