//! Execution and node execution bookkeeping.
//!
//! The tracker is the only writer of the records of one execution. Every
//! state change is persisted first and then published on the channel. Store
//! failures are logged and do not stop the execution.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tracing::{trace, warn};

use crate::{
    FlowError,
    dispatcher::DispatchOutcome,
    events::{ExecutionEvent, ExecutionFailedEvent, ExecutionStartEvent, GraphEvent, Message, NodeEvent},
    runtime::Channel,
    store::{
        Store,
        data::{ExecutionStatus, FlowExecution, FlowNodeExecution, NodeRunStatus},
    },
    utils::{self, time::elapsed_millis},
    workflow::node::NodeId,
};

pub struct Tracker {
    store: Arc<Store>,
    channel: Arc<Channel>,
    execution: Mutex<FlowExecution>,
    nodes: Mutex<HashMap<NodeId, FlowNodeExecution>>,
}

impl Tracker {
    pub fn new(
        store: Arc<Store>,
        channel: Arc<Channel>,
        execution: FlowExecution,
    ) -> Self {
        Self {
            store,
            channel,
            execution: Mutex::new(execution),
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// pending -> running
    pub fn start(
        &self,
        node_ids: Vec<NodeId>,
    ) {
        let record = self.update_execution(|exec| {
            exec.status = ExecutionStatus::Running;
        });
        self.emit_execution(
            &record,
            ExecutionEvent::Start(ExecutionStartEvent {
                flow_id: record.flow_id.clone(),
                node_ids,
            }),
        );
    }

    /// Create the record of a node that begins its first attempt.
    pub fn node_started(
        &self,
        nid: &str,
    ) {
        let now = utils::time::time_millis();
        let record = FlowNodeExecution {
            id: utils::longid(),
            execution_id: self.execution_id(),
            node_id: nid.to_string(),
            status: NodeRunStatus::Running,
            retry_attempt: 0,
            input_snapshot: Value::Null,
            output_snapshot: Value::Null,
            error_message: None,
            started_at: now,
            completed_at: None,
            timestamp: now,
        };
        if let Err(err) = self.store.node_executions().create(&record) {
            warn!(execution_id = %record.execution_id, node_id = nid, error = %err, "failed to create node execution");
        }
        self.nodes.lock().unwrap().insert(nid.to_string(), record);

        self.update_execution(|exec| {
            exec.current_node_id = Some(nid.to_string());
        });
        self.emit_node(nid, NodeEvent::Running(now));
    }

    pub fn node_input(
        &self,
        nid: &str,
        input: &Value,
    ) {
        self.update_node(nid, |record| {
            record.input_snapshot = input.clone();
        });
    }

    /// A failed attempt is retried as `attempt`.
    pub fn node_retry(
        &self,
        nid: &str,
        attempt: u32,
    ) {
        self.update_node(nid, |record| {
            record.retry_attempt = attempt;
            record.status = NodeRunStatus::Running;
        });
        self.emit_node(nid, NodeEvent::Retry(attempt));
    }

    pub fn node_completed(
        &self,
        nid: &str,
        output: &Value,
    ) {
        let now = utils::time::time_millis();
        self.update_node(nid, |record| {
            record.status = NodeRunStatus::Completed;
            record.output_snapshot = output.clone();
            record.completed_at = Some(now);
        });
        self.emit_node(nid, NodeEvent::Completed(now));
    }

    pub fn node_failed(
        &self,
        nid: &str,
        error: &str,
    ) {
        self.update_node(nid, |record| {
            record.status = NodeRunStatus::Failed;
            record.error_message = Some(error.to_string());
            record.completed_at = Some(utils::time::time_millis());
        });
        self.emit_node(nid, NodeEvent::Failed(error.to_string()));
    }

    /// Record a node that will never run because all its incoming edges were skipped.
    pub fn node_skipped(
        &self,
        nid: &str,
    ) {
        let now = utils::time::time_millis();
        let record = FlowNodeExecution {
            id: utils::longid(),
            execution_id: self.execution_id(),
            node_id: nid.to_string(),
            status: NodeRunStatus::Skipped,
            retry_attempt: 0,
            input_snapshot: Value::Null,
            output_snapshot: Value::Null,
            error_message: None,
            started_at: now,
            completed_at: Some(now),
            timestamp: now,
        };
        if let Err(err) = self.store.node_executions().create(&record) {
            warn!(execution_id = %record.execution_id, node_id = nid, error = %err, "failed to create node execution");
        }
        self.nodes.lock().unwrap().insert(nid.to_string(), record);
        self.emit_node(nid, NodeEvent::Skipped);
    }

    /// Fail every node record that is still open, used when the execution is stopped.
    pub fn abandon_open_nodes(
        &self,
        reason: &str,
    ) {
        let open = {
            let nodes = self.nodes.lock().unwrap();
            nodes.values().filter(|record| !record.status.is_terminal()).map(|record| record.node_id.clone()).collect::<Vec<_>>()
        };

        let now = utils::time::time_millis();
        for nid in open {
            self.update_node(&nid, |record| {
                record.status = NodeRunStatus::Failed;
                record.error_message = Some(reason.to_string());
                record.completed_at = Some(now);
            });
            self.emit_node(&nid, NodeEvent::Stopped(now));
        }
    }

    /// Write the terminal state of the execution. Only the first call has an effect.
    pub fn finish(
        &self,
        outcome: &DispatchOutcome,
    ) -> FlowExecution {
        let (status, error, event) = match outcome {
            DispatchOutcome::Completed => (ExecutionStatus::Completed, None, ExecutionEvent::Completed),
            DispatchOutcome::Failed(message) => (
                ExecutionStatus::Failed,
                Some(message.clone()),
                ExecutionEvent::Failed(ExecutionFailedEvent {
                    error: message.clone(),
                }),
            ),
            DispatchOutcome::TimedOut(secs) => {
                let message = FlowError::Timeout(*secs).to_string();
                (
                    ExecutionStatus::Failed,
                    Some(message.clone()),
                    ExecutionEvent::Failed(ExecutionFailedEvent {
                        error: message,
                    }),
                )
            }
            DispatchOutcome::Cancelled(reason) => (ExecutionStatus::Cancelled, Some(FlowError::Cancelled(reason.clone()).to_string()), ExecutionEvent::Cancelled(reason.clone())),
        };

        if let Some(reason) = &error {
            self.abandon_open_nodes(reason);
        }

        {
            let exec = self.execution.lock().unwrap();
            if exec.status.is_terminal() {
                return exec.clone();
            }
        }

        let now = utils::time::time_millis();
        let record = self.update_execution(|exec| {
            exec.status = status;
            exec.error_message = error;
            exec.completed_at = Some(now);
            exec.duration_ms = Some(elapsed_millis(exec.started_at, now));
        });
        self.emit_execution(&record, event);
        record
    }

    fn execution_id(&self) -> String {
        self.execution.lock().unwrap().id.clone()
    }

    fn update_execution<F>(
        &self,
        f: F,
    ) -> FlowExecution
    where
        F: FnOnce(&mut FlowExecution),
    {
        let record = {
            let mut exec = self.execution.lock().unwrap();
            f(&mut exec);
            exec.timestamp = utils::time::time_millis();
            exec.clone()
        };

        trace!(execution_id = %record.id, status = record.status.as_ref(), "tracker::update_execution");
        if let Err(err) = self.store.executions().update(&record) {
            warn!(execution_id = %record.id, error = %err, "failed to update execution");
        }
        record
    }

    fn update_node<F>(
        &self,
        nid: &str,
        f: F,
    ) where
        F: FnOnce(&mut FlowNodeExecution),
    {
        let record = {
            let mut nodes = self.nodes.lock().unwrap();
            let Some(record) = nodes.get_mut(nid) else {
                return;
            };
            f(record);
            record.timestamp = utils::time::time_millis();
            record.clone()
        };

        if let Err(err) = self.store.node_executions().update(&record) {
            warn!(execution_id = %record.execution_id, node_id = nid, error = %err, "failed to update node execution");
        }
    }

    fn emit_execution(
        &self,
        record: &FlowExecution,
        event: ExecutionEvent,
    ) {
        self.channel.emit(Message {
            execution_id: record.id.clone(),
            nid: String::new(),
            event: GraphEvent::Execution(event),
        });
    }

    fn emit_node(
        &self,
        nid: &str,
        event: NodeEvent,
    ) {
        self.channel.emit(Message {
            execution_id: self.execution_id(),
            nid: nid.to_string(),
            event: GraphEvent::Node(event),
        });
    }
}
