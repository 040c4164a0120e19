//! Resource models, one file per kind.

pub mod bucket;
pub mod check;
pub mod dashboard;
pub mod label;
pub mod notification_endpoint;
pub mod notification_rule;
pub mod org;
pub mod task;
pub mod telegraf;
pub mod variable;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use bucket::{Bucket, BucketKind, BucketUpdate};
pub use check::{Check, CheckUpdate};
pub use dashboard::{Cell, Dashboard, DashboardUpdate};
pub use label::{Label, LabelProperties, LabelUpdate};
pub use notification_endpoint::{EndpointKind, NotificationEndpoint, SecretField};
pub use notification_rule::{NotificationRule, StatusLevel, StatusRule};
pub use org::Organization;
pub use task::{Task, TaskKind, TaskUpdate};
pub use telegraf::{TelegrafConfig, TelegrafUpdate};
pub use variable::{Variable, VariableArguments, VariableUpdate};

use crate::error::CoreError;

/// Every labelable or package-addressable resource kind on the platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Bucket,
    Check,
    Dashboard,
    Label,
    NotificationEndpoint,
    NotificationRule,
    Task,
    Telegraf,
    Variable,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Bucket => "bucket",
            ResourceType::Check => "check",
            ResourceType::Dashboard => "dashboard",
            ResourceType::Label => "label",
            ResourceType::NotificationEndpoint => "notification_endpoint",
            ResourceType::NotificationRule => "notification_rule",
            ResourceType::Task => "task",
            ResourceType::Telegraf => "telegraf",
            ResourceType::Variable => "variable",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(ResourceType::Bucket),
            "check" => Ok(ResourceType::Check),
            "dashboard" => Ok(ResourceType::Dashboard),
            "label" => Ok(ResourceType::Label),
            "notification_endpoint" => Ok(ResourceType::NotificationEndpoint),
            "notification_rule" => Ok(ResourceType::NotificationRule),
            "task" => Ok(ResourceType::Task),
            "telegraf" => Ok(ResourceType::Telegraf),
            "variable" => Ok(ResourceType::Variable),
            other => Err(CoreError::UnknownResourceType(other.to_string())),
        }
    }
}

/// Activation state shared by checks, rules, endpoints, and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

/// A label attached to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMapping {
    pub label_id: Uuid,
    pub resource_id: Uuid,
    pub resource_type: ResourceType,
}
