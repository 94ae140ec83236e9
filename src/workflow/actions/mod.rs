mod agent;
mod condition;
mod delay;
mod local;
mod structural;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{Result, common::Vars, model::NodeType, runtime::Context, workflow::node::NodeId};

pub use agent::AgentAction;
pub use condition::{CONDITION_RESULT, ConditionAction};
pub use delay::DelayAction;
pub use local::{LocalAction, LocalActionKind};
pub use structural::{MergeAction, ParallelAction, TriggerAction};

/// What a single attempt of a node is run with.
#[derive(Debug, Clone)]
pub struct ActionInput {
    pub nid: NodeId,
    /// 0-based attempt index.
    pub attempt: u32,
    /// The node input template after resolution.
    pub input: Value,
    pub custom_attributes: Map<String, Value>,
}

#[async_trait]
pub trait Action: Send + Sync {
    /// Creates a new instance of the action from the node parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The type specific fields of the node, validated against [`Action::schema`].
    fn create(params: Value) -> Result<Self>
    where
        Self: Sized;

    /// JSON schema the node parameters must satisfy.
    fn schema() -> Value
    where
        Self: Sized;

    /// Returns the node type this action implements.
    fn action_type(&self) -> NodeType;

    /// Input template resolved before every attempt.
    fn input(&self) -> Option<&Value> {
        None
    }

    /// Executes one attempt of the node.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The [`Context`] of the execution.
    /// * `input` - The resolved [`ActionInput`] of this attempt.
    ///
    /// # Returns
    ///
    /// The node output on success. Errors are retried according to
    /// [`crate::FlowError::is_retryable`].
    async fn run(
        &self,
        ctx: Arc<Context>,
        input: ActionInput,
    ) -> Result<Vars>;
}

/// Validate `params` against the schema of `A` and build it.
pub(crate) fn build<A: Action + serde::de::DeserializeOwned>(params: Value) -> Result<A> {
    jsonschema::validate(&A::schema(), &params)?;
    Ok(serde_json::from_value::<A>(params)?)
}

/// Objects become the output as-is, other values are wrapped as `{ key: value }`.
pub(crate) fn into_vars(
    value: Value,
    key: &str,
) -> Vars {
    match value {
        Value::Object(map) => Vars::from(map),
        other => Vars::new().with(key, other),
    }
}
