use serde::{Deserialize, Serialize};

use crate::{
    FlowError, Result,
    model::{EdgeModel, NodeModel},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowSettings {
    /// Admission cap on simultaneously running executions of this flow, 0 means unlimited.
    pub max_concurrent_executions: u32,
    pub timeout_seconds: Option<u64>,
    pub retry_on_failure: bool,
    pub retry_count: u32,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            timeout_seconds: None,
            retry_on_failure: false,
            retry_count: 0,
        }
    }
}

/// A flow as authored by a designer.
///
/// Definitions are read-only while executing: every execution builds its own
/// runtime graph from a snapshot, so later edits only affect new executions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: FlowStatus,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub edges: Vec<EdgeModel>,
    #[serde(default)]
    pub settings: FlowSettings,
}

impl FlowDefinition {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<FlowDefinition>(s).map_err(|e| FlowError::Validation(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_active(&self) -> bool {
        self.status == FlowStatus::Active
    }
}
