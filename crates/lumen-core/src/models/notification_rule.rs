use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

/// Routes status transitions to a notification endpoint. Like checks, each
/// rule owns a platform-allocated system task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub task_id: Uuid,
    pub endpoint_id: Uuid,
    pub name: String,
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRule {
    pub current_level: StatusLevel,
    pub previous_level: Option<StatusLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusLevel {
    Crit,
    Warn,
    Info,
    Ok,
    Any,
}
