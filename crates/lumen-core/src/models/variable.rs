use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: VariableArguments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "camelCase")]
pub enum VariableArguments {
    Constant(Vec<String>),
    Map(BTreeMap<String, String>),
    Query { query: String, language: String },
}

impl Default for VariableArguments {
    fn default() -> Self {
        VariableArguments::Constant(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableUpdate {
    pub description: Option<String>,
    pub arguments: Option<VariableArguments>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_tag_by_type() {
        let args = VariableArguments::Query {
            query: "buckets()".to_string(),
            language: "flux".to_string(),
        };
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["type"], "query");
        assert_eq!(json["values"]["query"], "buckets()");

        let back: VariableArguments =
            serde_json::from_str(r#"{"type": "constant", "values": ["a", "b"]}"#).unwrap();
        assert_eq!(
            back,
            VariableArguments::Constant(vec!["a".to_string(), "b".to_string()])
        );
    }
}
