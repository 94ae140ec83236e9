use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    common::Vars,
    model::{ConditionModel, NodeType},
    runtime::Context,
    workflow::{
        actions::{Action, ActionInput, build},
        condition,
    },
};

/// Output key of a condition node.
pub const CONDITION_RESULT: &str = "condition_result";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConditionAction {
    condition: ConditionModel,
}

#[async_trait]
impl Action for ConditionAction {
    fn create(params: Value) -> Result<Self> {
        build(params)
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["condition"],
            "properties": {
                "condition": {
                    "type": "object",
                    "required": ["type", "field"],
                    "properties": {
                        "type": { "type": "string" },
                        "field": { "type": "string", "minLength": 1 }
                    }
                }
            }
        })
    }

    fn action_type(&self) -> NodeType {
        NodeType::Condition
    }

    async fn run(
        &self,
        ctx: Arc<Context>,
        input: ActionInput,
    ) -> Result<Vars> {
        let result = condition::evaluate(&ctx, &input.nid, &self.condition, None)?;
        Ok(Vars::new().with(CONDITION_RESULT, result))
    }
}
