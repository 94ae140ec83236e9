mod collect;
mod r#impl;

use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;

#[derive(Debug, Clone)]
pub struct MemStore {
    flows: Arc<Collect<Flow>>,
    executions: Arc<Collect<FlowExecution>>,
    node_executions: Arc<Collect<FlowNodeExecution>>,
}

trait DbDocument: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn doc(&self) -> Result<HashMap<String, JsonValue>>;
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.flows());
        s.register(self.executions());
        s.register(self.node_executions());
        Ok(())
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            flows: Arc::new(Collect::new("flows")),
            executions: Arc::new(Collect::new("executions")),
            node_executions: Arc::new(Collect::new("node_executions")),
        }
    }

    pub fn flows(&self) -> Arc<dyn DbCollection<Item = Flow> + Send + Sync> {
        self.flows.clone()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = FlowExecution> + Send + Sync> {
        self.executions.clone()
    }

    pub fn node_executions(&self) -> Arc<dyn DbCollection<Item = FlowNodeExecution> + Send + Sync> {
        self.node_executions.clone()
    }
}
