use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    Agent,
    Condition,
    Delay,
    Action,
    Parallel,
    Merge,
    Trigger,
}

/// Node-level retry override. When present it replaces the flow settings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RetryModel {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub count: u32,
}

/// Where to send a notification after the node completes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyTarget {
    Webhook {
        url: String,
    },
    Email {
        to: String,
    },
}

/// A node as authored in a flow definition.
///
/// Type specific fields (`agent_id`, `skill`, `input`, `condition`,
/// `duration_seconds`, ...) are kept in `params` and validated when the
/// runtime graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub uses: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryModel>,
    /// Per attempt timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<NotifyTarget>,
    /// Opaque bag handed to capabilities and notifiers untouched.
    #[serde(default, rename = "customAttributes", skip_serializing_if = "Map::is_empty")]
    pub custom_attributes: Map<String, Value>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl NodeModel {
    pub fn new(
        id: &str,
        uses: NodeType,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            uses,
            retry: None,
            timeout_seconds: None,
            notify: Vec::new(),
            custom_attributes: Map::new(),
            params: Map::new(),
        }
    }

    /// Set a type specific parameter.
    pub fn with_param(
        mut self,
        key: &str,
        value: Value,
    ) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn with_retry(
        mut self,
        count: u32,
    ) -> Self {
        self.retry = Some(RetryModel {
            enabled: true,
            count,
        });
        self
    }
}
