use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{FlowError, Result, ShareLock, model::FlowDefinition, utils};

use super::{DbCollection, DbCollectionIden, Query, StoreIden, data::*};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DbCollection<Item = DATA>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn flows(&self) -> Arc<dyn DbCollection<Item = Flow>> {
        self.collection()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = FlowExecution>> {
        self.collection()
    }

    pub fn node_executions(&self) -> Arc<dyn DbCollection<Item = FlowNodeExecution>> {
        self.collection()
    }

    /// Insert or replace a flow definition.
    pub fn deploy(
        &self,
        flow: &FlowDefinition,
    ) -> Result<bool> {
        trace!("store::deploy({})", flow.id);
        if flow.id.is_empty() {
            return Err(FlowError::Validation("missing id in flow".into()));
        }
        let flows = self.flows();
        let text = flow.to_json()?;
        match flows.find(&flow.id) {
            Ok(m) => {
                let data = Flow {
                    id: flow.id.clone(),
                    name: flow.name.clone(),
                    status: flow.status.as_ref().to_string(),
                    category: flow.category.clone(),
                    data: text,
                    create_time: m.create_time,
                    update_time: utils::time::time_millis(),
                };
                flows.update(&data)
            }
            Err(_) => {
                let data = Flow {
                    id: flow.id.clone(),
                    name: flow.name.clone(),
                    status: flow.status.as_ref().to_string(),
                    category: flow.category.clone(),
                    data: text,
                    create_time: utils::time::time_millis(),
                    update_time: 0,
                };
                flows.create(&data)
            }
        }
    }

    /// Load a deployed flow definition by id.
    pub fn find_flow(
        &self,
        flow_id: &str,
    ) -> Result<FlowDefinition> {
        let data = self.flows().find(flow_id)?;
        FlowDefinition::from_json(&data.data)
    }

    /// All node execution records of one execution, oldest first.
    pub fn list_node_executions(
        &self,
        execution_id: &str,
    ) -> Result<Vec<FlowNodeExecution>> {
        let q = Query::new().eq("execution_id", execution_id).order("started_at", false);
        Ok(self.node_executions().query(&q)?.rows)
    }
}
