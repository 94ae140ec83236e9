use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    store::{data::FlowNodeExecution, db::mem::DbDocument},
};

impl DbDocument for FlowNodeExecution {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), json!(self.id.clone()));
        map.insert("execution_id".to_string(), json!(self.execution_id.clone()));
        map.insert("node_id".to_string(), json!(self.node_id.clone()));
        map.insert("status".to_string(), json!(self.status.as_ref()));
        map.insert("retry_attempt".to_string(), json!(self.retry_attempt));
        map.insert("started_at".to_string(), json!(self.started_at));
        map.insert("completed_at".to_string(), json!(self.completed_at));
        map.insert("timestamp".to_string(), json!(self.timestamp));
        Ok(map)
    }
}
