mod execution;
mod flow;
mod node_execution;

pub use execution::{ExecutionStatus, FlowExecution};
pub use flow::Flow;
pub use node_execution::{FlowNodeExecution, NodeRunStatus};
