mod condition;
mod edge;
mod flow;
mod node;

pub use condition::{ConditionModel, ConditionOperator};
pub use edge::EdgeModel;
pub use flow::{FlowDefinition, FlowSettings, FlowStatus};
pub use node::{NodeModel, NodeType, NotifyTarget, RetryModel};
