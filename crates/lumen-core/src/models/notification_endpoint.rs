use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Status;

/// A destination that notification rules deliver to. Credentials are never
/// stored inline; each sensitive field references a key in the org's secret
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEndpoint {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    pub kind: EndpointKind,
    #[serde(default)]
    pub url: String,
    pub routing_key: Option<SecretField>,
    pub token: Option<SecretField>,
    pub username: Option<SecretField>,
    pub password: Option<SecretField>,
}

impl NotificationEndpoint {
    /// All populated secret references, in field order.
    pub fn secret_fields(&self) -> Vec<SecretField> {
        [
            self.routing_key.as_ref(),
            self.token.as_ref(),
            self.username.as_ref(),
            self.password.as_ref(),
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Slack,
    Pagerduty,
    Http,
}

/// A reference to a key in the org's secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretField {
    pub key: String,
}
