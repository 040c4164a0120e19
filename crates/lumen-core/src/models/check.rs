use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

/// A monitoring check. Each check owns a system task that evaluates its
/// query on the `every` cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: Uuid,
    pub org_id: Uuid,
    /// The task the platform allocated to run this check.
    pub task_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    pub query: String,
    pub every: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUpdate {
    pub description: Option<String>,
    pub status: Option<Status>,
    pub query: Option<String>,
    pub every: Option<String>,
}
