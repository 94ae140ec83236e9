use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*, map_db_err},
};

use super::{DbInit, collection::*, synclient::SynClient};

pub struct PostgresStore {
    flows: Arc<FlowCollection>,
    executions: Arc<ExecutionCollection>,
    node_executions: Arc<NodeExecutionCollection>,
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        self.flows.init()?;
        self.executions.init()?;
        self.node_executions.init()?;

        s.register(self.flows());
        s.register(self.executions());
        s.register(self.node_executions());
        Ok(())
    }
}

impl PostgresStore {
    pub fn new(
        db_url: &str,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let conn = Arc::new(SynClient::connect(db_url, runtime).map_err(map_db_err)?);
        info!("connected to postgres store");

        Ok(Self {
            flows: Arc::new(FlowCollection::new(&conn)),
            executions: Arc::new(ExecutionCollection::new(&conn)),
            node_executions: Arc::new(NodeExecutionCollection::new(&conn)),
        })
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
