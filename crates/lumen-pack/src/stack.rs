//! Stacks: the per-org registry handle grouping the package URLs and the
//! resources a deployment materialized.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lumen_core::models::ResourceType;

use crate::ports::{BoxFuture, PortError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Locations of the packages this stack is applied from.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Resources materialized by the most recent apply.
    #[serde(default)]
    pub resources: Vec<StackResource>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Stack {
    /// A stack ready for [`crate::Service::init_stack`]; ID and timestamps
    /// are assigned there.
    pub fn new(org_id: Uuid, name: impl Into<String>) -> Stack {
        Stack {
            id: Uuid::nil(),
            org_id,
            name: name.into(),
            description: String::new(),
            urls: Vec::new(),
            resources: Vec::new(),
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackResource {
    pub api_version: String,
    #[serde(rename = "resourceID")]
    pub id: Uuid,
    pub kind: ResourceType,
    pub pkg_name: String,
}

/// Persistence the stack registry depends on.
pub trait StackStore: Send + Sync {
    fn create_stack(&self, stack: Stack) -> BoxFuture<'_, Result<(), PortError>>;

    fn read_stack(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Stack>, PortError>>;

    fn update_stack(&self, stack: Stack) -> BoxFuture<'_, Result<(), PortError>>;

    fn delete_stack(&self, id: Uuid) -> BoxFuture<'_, Result<(), PortError>>;
}
