//! Runtime flow representation using a directed graph.
//!
//! Every execution builds its own [`Workflow`] from a snapshot of the
//! definition, so node and edge states never leak between executions.

use std::collections::{HashMap, HashSet};

use petgraph::{
    Direction, algo,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    FlowError, Result, ShareLock,
    model::FlowDefinition,
    workflow::{
        edge::{Edge, EdgeId},
        node::{Node, NodeId, NodeState},
    },
};

/// Whether a node may start, given the state of its incoming edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// At least one predecessor has not decided yet.
    Waiting,
    /// Every predecessor decided and at least one edge was taken.
    Ready,
    /// Every incoming edge was skipped.
    Skip,
}

/// Runtime flow as a directed graph of nodes and edges.
#[derive(Clone)]
pub struct Workflow {
    /// Thread-safe directed graph storing nodes and edges.
    graph: ShareLock<DiGraph<Node, Edge>>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Workflow {
    /// get node by id
    pub fn get_node(
        &self,
        id: &str,
    ) -> Option<Node> {
        let graph = self.graph.read().unwrap();
        self.index.get(id).map(|idx| graph[*idx].clone())
    }

    /// all node ids in definition order
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        let graph = self.graph.read().unwrap();
        graph.node_indices().map(|idx| graph[idx].id.clone()).collect()
    }

    /// nodes without incoming edges
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        let graph = self.graph.read().unwrap();
        graph.node_indices().filter(|idx| graph.neighbors_directed(*idx, Direction::Incoming).next().is_none()).map(|idx| graph[idx].id.clone()).collect()
    }

    /// Get all outgoing edges from a node
    pub fn outgoing_edges(
        &self,
        nid: &str,
    ) -> Vec<Edge> {
        let graph = self.graph.read().unwrap();
        self.index.get(nid).map(|idx| graph.edges_directed(*idx, Direction::Outgoing).map(|e| e.weight().clone()).collect()).unwrap_or_default()
    }

    pub fn node_state(
        &self,
        nid: &str,
    ) -> Option<NodeState> {
        let graph = self.graph.read().unwrap();
        self.index.get(nid).map(|idx| graph[*idx].status)
    }

    pub fn mark_node(
        &self,
        nid: &str,
        state: NodeState,
    ) {
        let mut graph = self.graph.write().unwrap();
        if let Some(idx) = self.index.get(nid) {
            graph[*idx].status = state;
        }
    }

    pub fn mark_edge(
        &self,
        id: &EdgeId,
        state: NodeState,
    ) {
        let mut graph = self.graph.write().unwrap();
        if let Some(idx) = graph.edge_indices().find(|idx| graph[*idx].id.eq(id)) {
            graph[idx].status = state;
        }
    }

    /// Decide whether `nid` may start.
    ///
    /// A node waits while any incoming edge is undecided, runs when at least
    /// one incoming edge was taken and is skipped when all of them were
    /// skipped. Entry nodes are always ready.
    pub fn readiness(
        &self,
        nid: &str,
    ) -> Readiness {
        let graph = self.graph.read().unwrap();
        let Some(idx) = self.index.get(nid) else {
            return Readiness::Waiting;
        };

        let mut incoming = graph.edges_directed(*idx, Direction::Incoming).map(|e| e.weight().status).peekable();
        if incoming.peek().is_none() {
            return Readiness::Ready;
        }

        let states = incoming.collect::<Vec<_>>();
        if states.iter().any(|s| *s == NodeState::Unknown) {
            Readiness::Waiting
        } else if states.iter().any(|s| *s == NodeState::Taken) {
            Readiness::Ready
        } else {
            Readiness::Skip
        }
    }
}

impl TryFrom<&FlowDefinition> for Workflow {
    type Error = FlowError;

    /// Build the runtime graph, rejecting structurally invalid definitions.
    fn try_from(flow: &FlowDefinition) -> Result<Self> {
        if flow.nodes.is_empty() {
            return Err(FlowError::Validation(format!("flow '{}' has no nodes", flow.id)));
        }

        let mut graph: DiGraph<Node, Edge> = DiGraph::new();
        let mut index = HashMap::new();

        for model in flow.nodes.iter() {
            if index.contains_key(&model.id) {
                return Err(FlowError::Validation(format!("duplicate node id '{}'", model.id)));
            }
            let node = Node::new(model)?;
            let idx = graph.add_node(node);
            index.insert(model.id.clone(), idx);
        }

        let mut edge_ids = HashSet::new();
        for model in flow.edges.iter() {
            let edge = Edge::from(model);
            if !edge_ids.insert(edge.id.clone()) {
                return Err(FlowError::Validation(format!("duplicate edge id '{}'", edge.id)));
            }
            let source = index.get(&edge.source).ok_or_else(|| FlowError::Validation(format!("edge '{}' references unknown node '{}'", edge.id, edge.source)))?;
            let target = index.get(&edge.target).ok_or_else(|| FlowError::Validation(format!("edge '{}' references unknown node '{}'", edge.id, edge.target)))?;
            graph.add_edge(*source, *target, edge);
        }

        if let Err(cycle) = algo::toposort(&graph, None) {
            return Err(FlowError::Validation(format!("flow graph contains a cycle at node '{}'", graph[cycle.node_id()].id)));
        }

        Ok(Self {
            graph: ShareLock::new(graph.into()),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{EdgeModel, NodeModel, NodeType};

    fn flow(
        nodes: &[&str],
        edges: &[(&str, &str)],
    ) -> FlowDefinition {
        FlowDefinition {
            id: "f".to_string(),
            name: "f".to_string(),
            nodes: nodes.iter().map(|id| NodeModel::new(id, NodeType::Parallel)).collect(),
            edges: edges.iter().map(|(from, to)| EdgeModel::new(from, to)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_and_entry_nodes() {
        let wf = Workflow::try_from(&flow(&["A", "B", "C"], &[("A", "C"), ("B", "C")])).unwrap();
        assert_eq!(wf.entry_nodes(), vec!["A", "B"]);
        assert_eq!(wf.all_node_ids(), vec!["A", "B", "C"]);
        assert_eq!(wf.outgoing_edges("A")[0].id, "A->C");
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let err = Workflow::try_from(&flow(&["A"], &[("A", "Z")])).err().unwrap();
        assert_eq!(err, FlowError::Validation("edge 'A->Z' references unknown node 'Z'".to_string()));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = Workflow::try_from(&flow(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "B")])).err().unwrap();
        assert!(matches!(err, FlowError::Validation(msg) if msg.contains("cycle")));
    }

    #[test]
    fn test_duplicates_rejected() {
        assert!(Workflow::try_from(&flow(&["A", "A"], &[])).is_err());
        assert!(Workflow::try_from(&flow(&["A", "B"], &[("A", "B"), ("A", "B")])).is_err());
        assert!(Workflow::try_from(&flow(&[], &[])).is_err());
    }

    #[test]
    fn test_invalid_node_params_rejected() {
        let mut def = flow(&["A"], &[]);
        def.nodes[0] = NodeModel::new("A", NodeType::Action).with_param("action", json!("explode"));
        assert!(matches!(Workflow::try_from(&def), Err(FlowError::Validation(_))));
    }

    #[test]
    fn test_readiness() {
        let wf = Workflow::try_from(&flow(&["A", "B", "M"], &[("A", "M"), ("B", "M")])).unwrap();
        assert_eq!(wf.readiness("A"), Readiness::Ready);
        assert_eq!(wf.readiness("M"), Readiness::Waiting);

        wf.mark_edge(&"A->M".to_string(), NodeState::Taken);
        assert_eq!(wf.readiness("M"), Readiness::Waiting);

        wf.mark_edge(&"B->M".to_string(), NodeState::Skipped);
        assert_eq!(wf.readiness("M"), Readiness::Ready);

        wf.mark_edge(&"A->M".to_string(), NodeState::Skipped);
        assert_eq!(wf.readiness("M"), Readiness::Skip);
    }
}
