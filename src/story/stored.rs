use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Option as persisted on a story node and served to clients.
///
/// `node_id` is the database id of the destination node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredOption {
    Continue { text: String, node_id: i32 },
    Terminal { text: String },
}

impl StoredOption {
    pub fn destination(&self) -> Option<i32> {
        match self {
            StoredOption::Continue { node_id, .. } => Some(*node_id),
            StoredOption::Terminal { .. } => None,
        }
    }
}

pub fn options_to_json(options: &[StoredOption]) -> serde_json::Value {
    serde_json::to_value(options).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

pub fn options_from_json(value: &serde_json::Value) -> Result<Vec<StoredOption>, serde_json::Error> {
    serde_json::from_value(value.clone())
}
