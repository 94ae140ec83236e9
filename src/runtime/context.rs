use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{
    capability::CapabilityInvoker,
    common::{MemCache, Shutdown, Vars},
    workflow::node::NodeId,
};

/// Per-execution state shared by the scheduler, the node runner and actions.
///
/// Holds the layers templates resolve against: trigger data, execution
/// metadata, deployment variables and the outputs of completed nodes.
#[derive(Clone)]
pub struct Context {
    execution_id: String,
    flow_id: String,
    tenant_id: String,
    trigger_data: Value,
    env: Arc<MemCache<String, String>>,
    outputs: Arc<MemCache<NodeId, Vars>>,
    invoker: Arc<dyn CapabilityInvoker>,

    shutdown: Arc<Shutdown>,
}

impl Context {
    pub fn new(
        execution_id: &str,
        flow_id: &str,
        tenant_id: &str,
        trigger_data: Value,
        invoker: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            flow_id: flow_id.to_string(),
            tenant_id: tenant_id.to_string(),
            trigger_data,
            env: Arc::new(MemCache::new()),
            outputs: Arc::new(MemCache::new()),
            invoker,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn trigger_data(&self) -> &Value {
        &self.trigger_data
    }

    /// Execution metadata exposed to templates as `context.*`.
    pub fn metadata(
        &self,
        nid: &str,
    ) -> Value {
        json!({
            "execution_id": self.execution_id,
            "flow_id": self.flow_id,
            "tenant_id": self.tenant_id,
            "node_id": nid,
        })
    }

    pub fn env(&self) -> Arc<MemCache<String, String>> {
        self.env.clone()
    }

    /// All deployment variables as one JSON object.
    pub fn env_object(&self) -> Value {
        let map = self.env.iter().map(|(k, v)| (k.as_ref().clone(), Value::String(v))).collect::<Map<String, Value>>();
        Value::Object(map)
    }

    pub fn outputs(&self) -> Arc<MemCache<NodeId, Vars>> {
        self.outputs.clone()
    }

    pub fn add_output(
        &self,
        nid: NodeId,
        outputs: Vars,
    ) {
        self.outputs.set(nid, outputs);
    }

    pub fn invoker(&self) -> Arc<dyn CapabilityInvoker> {
        self.invoker.clone()
    }

    /// Stop the execution. The first reason wins.
    pub fn stop(
        &self,
        reason: &str,
    ) {
        debug!(execution_id = %self.execution_id, reason, "stopping in-flight nodes");
        self.shutdown.shutdown();
    }

    pub fn wait_shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shutdown.wait()
    }
}
