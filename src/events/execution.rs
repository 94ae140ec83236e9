use crate::workflow::node::NodeId;

#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Start(ExecutionStartEvent),
    Completed,
    Failed(ExecutionFailedEvent),
    Cancelled(String),
}

impl ExecutionEvent {
    pub fn str(&self) -> &str {
        match self {
            ExecutionEvent::Start(_) => "Running",
            ExecutionEvent::Completed => "Completed",
            ExecutionEvent::Failed(_) => "Failed",
            ExecutionEvent::Cancelled(_) => "Cancelled",
        }
    }
}

/// Event emitted when an execution starts running
#[derive(Debug, Clone)]
pub struct ExecutionStartEvent {
    pub flow_id: String,
    /// All node ids of the flow
    pub node_ids: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ExecutionFailedEvent {
    pub error: String,
}
