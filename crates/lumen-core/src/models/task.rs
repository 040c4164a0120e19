use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub org_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub status: Status,
    pub script: String,
    pub every: Option<String>,
}

/// System tasks run the platform's own scripts (and back checks and rules);
/// cron tasks are scheduled by expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    System,
    Cron,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub status: Option<Status>,
    pub script: Option<String>,
    pub every: Option<String>,
}
