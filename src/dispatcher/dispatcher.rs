//! Graph scheduler for one execution.
//!
//! The dispatcher is responsible for:
//! - Starting entry nodes and every node whose incoming edges are decided
//! - Evaluating edge conditions against the output of the source node
//! - Skipping nodes whose incoming edges were all skipped
//! - Enforcing the flow timeout and reacting to cancel commands

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{task::JoinSet, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    FlowError, Result,
    common::Queue,
    dispatcher::runner::{NodeOutcome, NodeRunner},
    engine::Tracker,
    runtime::{Context, ExecutionCommand},
    workflow::{
        Readiness, Workflow, condition,
        node::{NodeId, NodeState},
    },
};

/// How the scheduler stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No node failed.
    Completed,
    /// The first node failure, or an edge condition that could not be evaluated.
    Failed(String),
    /// The flow timeout in seconds elapsed.
    TimedOut(u64),
    /// Cancelled by the caller with a reason.
    Cancelled(String),
}

type NodeTasks = JoinSet<(NodeId, NodeOutcome)>;

pub struct Dispatcher {
    /// Execution context with trigger data, env and outputs.
    ctx: Arc<Context>,
    /// The runtime graph of this execution.
    workflow: Arc<Workflow>,
    runner: Arc<NodeRunner>,
    tracker: Arc<Tracker>,
    /// Queue for receiving execution commands.
    command_queue: Arc<Queue<ExecutionCommand>>,
    timeout_seconds: Option<u64>,
    /// How long stopped nodes may take to wind down.
    grace: Duration,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<Context>,
        workflow: Arc<Workflow>,
        runner: Arc<NodeRunner>,
        tracker: Arc<Tracker>,
        command_queue: Arc<Queue<ExecutionCommand>>,
        timeout_seconds: Option<u64>,
        grace: Duration,
    ) -> Self {
        Self {
            ctx,
            workflow,
            runner,
            tracker,
            command_queue,
            timeout_seconds,
            grace,
        }
    }

    /// Drive the graph until no node is ready and none is in flight.
    ///
    /// After the first failure no new node is started, nodes already running
    /// are allowed to finish.
    pub async fn run(self) -> DispatchOutcome {
        let mut tasks = NodeTasks::new();
        let mut failure: Option<String> = None;

        self.tracker.start(self.workflow.all_node_ids());
        for nid in self.workflow.entry_nodes() {
            self.spawn(&mut tasks, nid);
        }

        // a deadline past what Instant can represent never fires
        let deadline = self.timeout_seconds.and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        while !tasks.is_empty() {
            tokio::select! {
                Some(joined) = tasks.join_next() => match joined {
                    Ok((nid, NodeOutcome::Completed(output))) => {
                        if failure.is_some() {
                            continue;
                        }
                        if let Err(err) = self.advance(&mut tasks, &nid, &output) {
                            warn!(execution_id = self.ctx.execution_id(), node_id = %nid, error = %err, "edge evaluation failed");
                            failure = Some(format!("edge evaluation after node '{}' failed: {}", nid, err));
                        }
                    }
                    Ok((nid, NodeOutcome::Failed(message))) => {
                        debug!(execution_id = self.ctx.execution_id(), node_id = %nid, "node failed, no new nodes will start");
                        failure.get_or_insert(message);
                    }
                    Ok((_, NodeOutcome::Stopped)) => {}
                    Err(err) => {
                        failure.get_or_insert(format!("node task aborted: {}", err));
                    }
                },
                _ = &mut timer => {
                    let secs = self.timeout_seconds.unwrap_or_default();
                    info!(execution_id = self.ctx.execution_id(), "execution timed out after {} seconds", secs);
                    self.stop(&mut tasks, &FlowError::Timeout(secs).to_string()).await;
                    return DispatchOutcome::TimedOut(secs);
                }
                Some(cmd) = self.command_queue.next_async() => match cmd {
                    ExecutionCommand::Cancel(reason) => {
                        info!(execution_id = self.ctx.execution_id(), "execution cancelled: {}", reason);
                        self.stop(&mut tasks, &FlowError::Cancelled(reason.clone()).to_string()).await;
                        return DispatchOutcome::Cancelled(reason);
                    }
                },
            }
        }

        match failure {
            Some(message) => DispatchOutcome::Failed(message),
            None => DispatchOutcome::Completed,
        }
    }

    /// Start `nid` on its own task.
    fn spawn(
        &self,
        tasks: &mut NodeTasks,
        nid: NodeId,
    ) {
        let Some(node) = self.workflow.get_node(&nid) else {
            return;
        };
        self.workflow.mark_node(&nid, NodeState::Taken);

        let runner = self.runner.clone();
        tasks.spawn(async move {
            let outcome = runner.run(&node).await;
            (nid, outcome)
        });
    }

    /// Decide the outgoing edges of a completed node and start whatever became ready.
    fn advance(
        &self,
        tasks: &mut NodeTasks,
        nid: &NodeId,
        output: &Value,
    ) -> Result<()> {
        self.workflow.mark_node(nid, NodeState::Executed);

        let mut worklist = Vec::new();
        for edge in self.workflow.outgoing_edges(nid) {
            let taken = match &edge.condition {
                Some(cond) => condition::evaluate(&self.ctx, nid, cond, Some(output))?,
                None => true,
            };
            self.workflow.mark_edge(&edge.id, if taken { NodeState::Taken } else { NodeState::Skipped });
            worklist.push(edge.target);
        }

        self.settle(tasks, worklist);
        Ok(())
    }

    /// Start ready nodes and propagate skips until nothing changes.
    fn settle(
        &self,
        tasks: &mut NodeTasks,
        mut worklist: Vec<NodeId>,
    ) {
        while let Some(nid) = worklist.pop() {
            if self.workflow.node_state(&nid) != Some(NodeState::Unknown) {
                continue;
            }

            match self.workflow.readiness(&nid) {
                Readiness::Waiting => {}
                Readiness::Ready => self.spawn(tasks, nid),
                Readiness::Skip => {
                    self.workflow.mark_node(&nid, NodeState::Skipped);
                    self.tracker.node_skipped(&nid);
                    for edge in self.workflow.outgoing_edges(&nid) {
                        self.workflow.mark_edge(&edge.id, NodeState::Skipped);
                        worklist.push(edge.target);
                    }
                }
            }
        }
    }

    /// Signal running nodes and give them `grace` to return before aborting.
    async fn stop(
        &self,
        tasks: &mut NodeTasks,
        reason: &str,
    ) {
        self.ctx.stop(reason);

        let drained = tokio::time::timeout(self.grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(execution_id = self.ctx.execution_id(), "abandoning {} node task(s) after grace period", tasks.len());
            tasks.abort_all();
        }
    }
}
