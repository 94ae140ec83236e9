use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled)
    }
}

/// One run of a flow against a trigger context.
///
/// The terminal state is written exactly once; a manual retry creates a new
/// record pointing back through `retry_of`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FlowExecution {
    pub id: String,
    pub flow_id: String,
    pub tenant_id: String,
    pub status: ExecutionStatus,
    pub trigger_data: Value,
    pub context_id: Option<String>,
    pub context_type: Option<String>,
    /// Last node that changed state, for progress display.
    pub current_node_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_of: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub duration_ms: Option<i64>,
    pub timestamp: i64,
}

impl DbCollectionIden for FlowExecution {
    fn iden() -> StoreIden {
        StoreIden::Executions
    }
}
