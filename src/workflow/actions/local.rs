use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    FlowError, Result,
    common::Vars,
    model::NodeType,
    runtime::Context,
    workflow::actions::{Action, ActionInput, build, into_vars},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocalActionKind {
    /// `{ results: <input> }`
    AggregateResults,
    /// Shallow merge of the object valued inputs, later keys win.
    MergeObjects,
    /// The resolved input unchanged.
    Passthrough,
}

/// A pure transformation of the resolved input, no I/O.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LocalAction {
    action: LocalActionKind,
    #[serde(default = "empty_input")]
    input: Value,
}

fn empty_input() -> Value {
    json!({})
}

impl LocalAction {
    pub fn apply(
        kind: LocalActionKind,
        input: Value,
    ) -> Result<Vars> {
        match kind {
            LocalActionKind::AggregateResults => Ok(Vars::new().with("results", input)),
            LocalActionKind::MergeObjects => {
                let Value::Object(parts) = input else {
                    return Err(FlowError::Action("merge_objects expects an object input".to_string()));
                };
                let mut merged = Map::new();
                for (name, part) in parts {
                    match part {
                        Value::Object(fields) => merged.extend(fields),
                        Value::Null => {}
                        _ => return Err(FlowError::Action(format!("merge_objects input '{}' is not an object", name))),
                    }
                }
                Ok(Vars::from(merged))
            }
            LocalActionKind::Passthrough => Ok(into_vars(input, "value")),
        }
    }
}

#[async_trait]
impl Action for LocalAction {
    fn create(params: Value) -> Result<Self> {
        build(params)
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["action"],
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["aggregate_results", "merge_objects", "passthrough"]
                },
                "input": {}
            }
        })
    }

    fn action_type(&self) -> NodeType {
        NodeType::Action
    }

    fn input(&self) -> Option<&Value> {
        Some(&self.input)
    }

    async fn run(
        &self,
        _: Arc<Context>,
        input: ActionInput,
    ) -> Result<Vars> {
        Self::apply(self.action, input.input)
    }
}
