use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    common::Vars,
    model::NodeType,
    runtime::Context,
    workflow::actions::{Action, ActionInput, into_vars},
};

macro_rules! structural_action {
    ($name:ident, $uses:expr) => {
        /// No work of its own, the edge topology gives it meaning.
        #[derive(Serialize, Deserialize, Debug, Clone, Default)]
        pub struct $name;

        #[async_trait]
        impl Action for $name {
            fn create(_: Value) -> Result<Self> {
                Ok($name)
            }

            fn schema() -> Value {
                json!({})
            }

            fn action_type(&self) -> NodeType {
                $uses
            }

            async fn run(
                &self,
                _: Arc<Context>,
                _: ActionInput,
            ) -> Result<Vars> {
                Ok(Vars::new())
            }
        }
    };
}

structural_action!(ParallelAction, NodeType::Parallel);
structural_action!(MergeAction, NodeType::Merge);

/// Entry node exposing the trigger data as its output.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TriggerAction;

#[async_trait]
impl Action for TriggerAction {
    fn create(_: Value) -> Result<Self> {
        Ok(TriggerAction)
    }

    fn schema() -> Value {
        json!({})
    }

    fn action_type(&self) -> NodeType {
        NodeType::Trigger
    }

    async fn run(
        &self,
        ctx: Arc<Context>,
        _: ActionInput,
    ) -> Result<Vars> {
        Ok(into_vars(ctx.trigger_data().clone(), "trigger_data"))
    }
}
