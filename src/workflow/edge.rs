//! Runtime edges connecting nodes.
//!
//! An edge without a condition is always taken once its source completes. A
//! conditional edge is evaluated against the source output and is either
//! taken or skipped.

use crate::{
    model::{ConditionModel, EdgeModel},
    workflow::node::{NodeId, NodeState},
};

/// Unique identifier for an edge within a flow.
pub type EdgeId = String;

#[derive(Debug, Clone)]
pub struct Edge {
    /// Unique edge identifier.
    pub id: EdgeId,
    /// ID of the source node.
    pub source: NodeId,
    /// ID of the target node.
    pub target: NodeId,
    /// Optional guard evaluated when the source completes.
    pub condition: Option<ConditionModel>,
    /// Current execution state of this edge.
    pub status: NodeState,
}

impl From<&EdgeModel> for Edge {
    fn from(model: &EdgeModel) -> Self {
        Self {
            id: model.edge_id(),
            source: model.from.clone(),
            target: model.to.clone(),
            condition: model.condition.clone(),
            status: NodeState::Unknown,
        }
    }
}
