use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{CapabilityInvoker, CapabilityRef, CapabilitySource, InvocationContext, InvocationError};

/// An in-process capability exposing one or more named skills.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn call(
        &self,
        skill: &str,
        input: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, InvocationError>;
}

/// Invoker backed by locally registered capabilities.
///
/// `external` references are forwarded to the remote invoker when one is
/// configured and fail terminally otherwise.
#[derive(Default)]
pub struct CapabilityRegistry {
    local: RwLock<HashMap<String, Arc<dyn Capability>>>,
    remote: Option<Arc<dyn CapabilityInvoker>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(
        mut self,
        remote: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn register(
        &self,
        agent_id: &str,
        capability: Arc<dyn Capability>,
    ) {
        self.local.write().unwrap().insert(agent_id.to_string(), capability);
    }
}

#[async_trait]
impl CapabilityInvoker for CapabilityRegistry {
    async fn invoke(
        &self,
        capability: &CapabilityRef,
        input: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, InvocationError> {
        match capability.source {
            CapabilitySource::Local => {
                let handle = self.local.read().unwrap().get(&capability.agent_id).cloned();
                let handle = handle.ok_or_else(|| InvocationError::terminal(format!("capability '{}' not found", capability.agent_id)))?;
                debug!(agent_id = %capability.agent_id, skill = %capability.skill, node_id = %ctx.node_id, "invoke local capability");
                handle.call(&capability.skill, input, ctx).await
            }
            CapabilitySource::External => match &self.remote {
                Some(remote) => remote.invoke(capability, input, ctx).await,
                None => Err(InvocationError::terminal(format!("no remote invoker for external capability '{}'", capability.agent_id))),
            },
        }
    }
}
