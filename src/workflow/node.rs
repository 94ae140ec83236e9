use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    FlowError, Result,
    model::{NodeModel, NodeType, NotifyTarget, RetryModel},
    workflow::actions::{Action, AgentAction, ConditionAction, DelayAction, LocalAction, MergeAction, ParallelAction, TriggerAction},
};

/// node id
pub type NodeId = String;

/// State of a node or edge while the scheduler walks the graph.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeState {
    #[default]
    Unknown,
    Taken,
    Executed,
    Skipped,
}

/// Runtime node built from a [`NodeModel`].
#[derive(Clone)]
pub struct Node {
    /// node id
    pub id: NodeId,
    /// display name, defaults to the id
    pub name: String,
    /// uses which action
    pub uses: NodeType,
    /// node level retry override
    pub retry: Option<RetryModel>,
    /// per attempt timeout
    pub timeout: Option<Duration>,
    /// notifications sent after the node completes
    pub notify: Vec<NotifyTarget>,
    /// opaque attributes forwarded to capabilities and notifiers
    pub custom_attributes: Map<String, Value>,
    /// node execution state
    pub status: NodeState,
    /// node action
    pub action: Arc<dyn Action>,
}

impl std::fmt::Debug for Node {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Node").field("id", &self.id).field("uses", &self.uses).field("status", &self.status).finish()
    }
}

impl Node {
    pub fn new(model: &NodeModel) -> Result<Self> {
        let action = Self::create_action(model.uses, Value::Object(model.params.clone())).map_err(|e| match e {
            FlowError::Validation(msg) | FlowError::Convert(msg) => FlowError::Validation(format!("node '{}': {}", model.id, msg)),
            other => other,
        })?;

        Ok(Self {
            id: model.id.clone(),
            name: model.name.clone().unwrap_or_else(|| model.id.clone()),
            uses: model.uses,
            retry: model.retry.clone(),
            timeout: model.timeout_seconds.map(Duration::from_secs),
            notify: model.notify.clone(),
            custom_attributes: model.custom_attributes.clone(),
            status: NodeState::Unknown,
            action,
        })
    }

    fn create_action(
        uses: NodeType,
        params: Value,
    ) -> Result<Arc<dyn Action>> {
        Ok(match uses {
            NodeType::Agent => Arc::new(AgentAction::create(params)?),
            NodeType::Condition => Arc::new(ConditionAction::create(params)?),
            NodeType::Delay => Arc::new(DelayAction::create(params)?),
            NodeType::Action => Arc::new(LocalAction::create(params)?),
            NodeType::Parallel => Arc::new(ParallelAction::create(params)?),
            NodeType::Merge => Arc::new(MergeAction::create(params)?),
            NodeType::Trigger => Arc::new(TriggerAction::create(params)?),
        })
    }

    /// Number of retries after the first attempt.
    ///
    /// A node level retry block replaces the flow settings entirely.
    pub fn max_retries(
        &self,
        flow_retry_on_failure: bool,
        flow_retry_count: u32,
    ) -> u32 {
        match &self.retry {
            Some(retry) if retry.enabled => retry.count,
            Some(_) => 0,
            None if flow_retry_on_failure => flow_retry_count,
            None => 0,
        }
    }
}
