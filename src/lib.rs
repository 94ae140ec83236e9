//! # agentflow
//!
//! agentflow is an embeddable flow execution engine. A flow is a directed
//! acyclic graph of nodes (capability calls, conditions, delays, local
//! actions, fan-out and merge points) connected by optionally conditional
//! edges.
//!
//! ## Core Features
//!
//! - **Graph Scheduling**: independent branches run concurrently, merge nodes wait for every decided predecessor
//! - **Retry and Timeouts**: per node retry with exponential backoff, per attempt and per flow timeouts
//! - **Templates**: `${...}` interpolation over trigger data, execution metadata, env and node outputs
//! - **Execution History**: one record per execution and per node, in memory or in PostgreSQL
//! - **Event Channel**: subscribe to execution and node events filtered by glob patterns
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentflow::{EngineBuilder, FlowDefinition, Trigger};
//!
//! let engine = EngineBuilder::new().invoker(Arc::new(registry)).build()?;
//! engine.launch();
//!
//! let flow = FlowDefinition::from_json(json_str)?;
//! engine.deploy(&flow)?;
//! let execution_id = engine.execute(&flow.id, Trigger::new("tenant-1", json!({"vendor": "acme"})))?;
//! let execution = engine.wait(&execution_id)?;
//! ```

mod builder;
pub mod capability;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
pub mod events;
mod model;
pub mod notify;
mod runtime;
mod store;
mod utils;
mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use capability::{Capability, CapabilityInvoker, CapabilityRef, CapabilityRegistry, CapabilitySource, HttpCapabilityInvoker, InvocationContext, InvocationError};
pub use common::Vars;
pub use config::{Config, PostgresConfig, StoreConfig, StoreType};
pub use engine::{Engine, ExecutionDetail, Trigger};
pub use error::FlowError;
pub use model::*;
pub use notify::{NoopNotifier, Notification, Notifier, WebhookNotifier};
pub use runtime::{Channel, ChannelEvent, ChannelOptions};
pub use store::data::{ExecutionStatus, FlowExecution, FlowNodeExecution, NodeRunStatus};

/// Result type alias for agentflow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
