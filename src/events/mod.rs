//! Event types for flow execution.
//!
//! Events are published on the engine channel whenever an execution or one
//! of its nodes changes state. They are emitted after the matching record has
//! been written, so a subscriber reading the store sees the new state.

mod execution;
mod node;

pub use execution::*;
pub use node::*;

use crate::workflow::node::NodeId;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type for execution graph events.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// Execution-level events (start, completed, failed, cancelled).
    Execution(ExecutionEvent),
    /// Node-level events (running, retry, completed, failed, ...).
    Node(NodeEvent),
}

/// Event message carrying the execution and node it belongs to.
#[derive(Debug, Clone)]
pub struct Message {
    /// Execution that generated this event.
    pub execution_id: String,
    /// Node that generated this event (empty for execution events).
    pub nid: NodeId,
    /// The actual event data.
    pub event: GraphEvent,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl GraphEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, GraphEvent::Execution(ExecutionEvent::Completed))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GraphEvent::Execution(ExecutionEvent::Failed(_)))
    }

    /// Completed, failed or cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GraphEvent::Execution(ExecutionEvent::Completed | ExecutionEvent::Failed(_) | ExecutionEvent::Cancelled(_)))
    }
}
