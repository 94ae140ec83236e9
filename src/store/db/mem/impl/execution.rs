use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    store::{data::FlowExecution, db::mem::DbDocument},
};

impl DbDocument for FlowExecution {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), json!(self.id.clone()));
        map.insert("flow_id".to_string(), json!(self.flow_id.clone()));
        map.insert("tenant_id".to_string(), json!(self.tenant_id.clone()));
        map.insert("status".to_string(), json!(self.status.as_ref()));
        map.insert("context_id".to_string(), json!(self.context_id.clone()));
        map.insert("context_type".to_string(), json!(self.context_type.clone()));
        map.insert("retry_of".to_string(), json!(self.retry_of.clone()));
        map.insert("started_at".to_string(), json!(self.started_at));
        map.insert("completed_at".to_string(), json!(self.completed_at));
        map.insert("timestamp".to_string(), json!(self.timestamp));
        Ok(map)
    }
}
