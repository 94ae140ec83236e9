//! Boundary to the capabilities ("agents") a flow can call.
//!
//! The engine only sees [`CapabilityInvoker`]. Whether a capability runs in
//! process ([`CapabilityRegistry`]) or behind an HTTP endpoint
//! ([`HttpCapabilityInvoker`]) is decided by whoever builds the engine.

mod http;
mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::FlowError;

pub use http::HttpCapabilityInvoker;
pub use registry::{Capability, CapabilityRegistry};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CapabilitySource {
    #[default]
    Local,
    #[serde(alias = "external_reference", alias = "external-reference")]
    External,
}

/// Which capability and skill an agent node calls.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRef {
    pub agent_id: String,
    #[serde(default)]
    pub source: CapabilitySource,
    pub skill: String,
}

/// Execution metadata handed to every invocation.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InvocationContext {
    pub execution_id: String,
    pub flow_id: String,
    pub tenant_id: String,
    pub node_id: String,
    pub attempt: u32,
    #[serde(rename = "customAttributes")]
    pub custom_attributes: Map<String, Value>,
}

/// Failure reported by a capability.
///
/// `retryable` separates transient failures (timeouts, I/O) from terminal
/// ones (invalid input, unknown capability).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct InvocationError {
    pub message: String,
    pub retryable: bool,
}

impl InvocationError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<InvocationError> for FlowError {
    fn from(err: InvocationError) -> Self {
        FlowError::Invocation {
            message: err.message,
            retryable: err.retryable,
        }
    }
}

#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    /// Run `capability.skill` with an already resolved input.
    async fn invoke(
        &self,
        capability: &CapabilityRef,
        input: Value,
        ctx: &InvocationContext,
    ) -> std::result::Result<Value, InvocationError>;
}
