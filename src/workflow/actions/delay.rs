use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    FlowError, Result,
    common::Vars,
    model::NodeType,
    runtime::Context,
    workflow::actions::{Action, ActionInput, build},
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Suspends its own branch for a fixed duration.
///
/// Cancellation is handled by the node runner, which drops the sleep when
/// the execution stops.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DelayAction {
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    duration_days: Option<f64>,
}

impl DelayAction {
    pub fn duration(&self) -> Result<Duration> {
        let seconds = self.duration_seconds.unwrap_or(0.0) + self.duration_days.unwrap_or(0.0) * SECONDS_PER_DAY;
        Duration::try_from_secs_f64(seconds.max(0.0)).map_err(|e| FlowError::Validation(format!("delay of {} seconds is out of range: {}", seconds, e)))
    }
}

#[async_trait]
impl Action for DelayAction {
    fn create(params: Value) -> Result<Self> {
        let action: Self = build(params)?;
        action.duration()?;
        Ok(action)
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "anyOf": [
                { "required": ["duration_seconds"] },
                { "required": ["duration_days"] }
            ],
            "properties": {
                "duration_seconds": { "type": "number", "minimum": 0 },
                "duration_days": { "type": "number", "minimum": 0 }
            }
        })
    }

    fn action_type(&self) -> NodeType {
        NodeType::Delay
    }

    async fn run(
        &self,
        _: Arc<Context>,
        _: ActionInput,
    ) -> Result<Vars> {
        tokio::time::sleep(self.duration()?).await;
        Ok(Vars::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        assert_eq!(DelayAction::create(json!({"duration_seconds": 2})).unwrap().duration().unwrap(), Duration::from_secs(2));
        assert_eq!(DelayAction::create(json!({"duration_days": 1})).unwrap().duration().unwrap(), Duration::from_secs(86_400));
        assert!(DelayAction::create(json!({})).is_err());
        assert!(DelayAction::create(json!({"duration_seconds": -1})).is_err());
    }

    #[test]
    fn test_out_of_range_duration_rejected() {
        let err = DelayAction::create(json!({"duration_days": 1e15})).unwrap_err();
        assert!(matches!(err, FlowError::Validation(msg) if msg.contains("out of range")));
        assert!(DelayAction::create(json!({"duration_seconds": 1e20})).is_err());
    }
}
