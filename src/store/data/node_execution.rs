use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeRunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeRunStatus::Completed | NodeRunStatus::Failed | NodeRunStatus::Skipped)
    }
}

/// Bookkeeping for one node within an execution.
///
/// A single row is kept per node and updated in place; `retry_attempt` is the
/// 0-based index of the latest attempt.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FlowNodeExecution {
    pub id: String,
    pub execution_id: String,
    pub node_id: String,
    pub status: NodeRunStatus,
    pub retry_attempt: u32,
    pub input_snapshot: Value,
    pub output_snapshot: Value,
    pub error_message: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub timestamp: i64,
}

impl DbCollectionIden for FlowNodeExecution {
    fn iden() -> StoreIden {
        StoreIden::NodeExecutions
    }
}
