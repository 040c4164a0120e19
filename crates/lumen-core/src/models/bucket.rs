use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-series bucket. Retention of zero means keep forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub retention_seconds: u64,
    #[serde(default)]
    pub kind: BucketKind,
}

/// System buckets are platform-managed (monitoring, task logs) and are never
/// exported or applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BucketKind {
    #[default]
    User,
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketUpdate {
    pub description: Option<String>,
    pub retention_seconds: Option<u64>,
}
