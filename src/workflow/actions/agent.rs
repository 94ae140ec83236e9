use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    capability::{CapabilityRef, CapabilitySource, InvocationContext},
    common::Vars,
    model::NodeType,
    runtime::Context,
    workflow::actions::{Action, ActionInput, build, into_vars},
};

/// Calls a capability skill with the resolved node input.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AgentAction {
    agent_id: String,
    #[serde(default)]
    source: CapabilitySource,
    skill: String,
    #[serde(default = "empty_input")]
    input: Value,
}

fn empty_input() -> Value {
    json!({})
}

impl AgentAction {
    pub fn capability(&self) -> CapabilityRef {
        CapabilityRef {
            agent_id: self.agent_id.clone(),
            source: self.source,
            skill: self.skill.clone(),
        }
    }
}

#[async_trait]
impl Action for AgentAction {
    fn create(params: Value) -> Result<Self> {
        build(params)
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["agent_id", "skill"],
            "properties": {
                "agent_id": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Id of the capability to call"
                },
                "source": {
                    "type": "string",
                    "enum": ["local", "external", "external_reference", "external-reference"]
                },
                "skill": {
                    "type": "string",
                    "minLength": 1
                },
                "input": {
                    "description": "Input template, string leaves may contain ${...} expressions"
                }
            }
        })
    }

    fn action_type(&self) -> NodeType {
        NodeType::Agent
    }

    fn input(&self) -> Option<&Value> {
        Some(&self.input)
    }

    async fn run(
        &self,
        ctx: Arc<Context>,
        input: ActionInput,
    ) -> Result<Vars> {
        let invocation = InvocationContext {
            execution_id: ctx.execution_id().to_string(),
            flow_id: ctx.flow_id().to_string(),
            tenant_id: ctx.tenant_id().to_string(),
            node_id: input.nid,
            attempt: input.attempt,
            custom_attributes: input.custom_attributes,
        };

        let output = ctx.invoker().invoke(&self.capability(), input.input, &invocation).await?;
        Ok(into_vars(output, "result"))
    }
}
