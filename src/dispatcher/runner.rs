//! Runs one node: input resolution, attempts, timeouts, backoff and
//! notifications.

use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    FlowError, Result,
    common::Vars,
    engine::Tracker,
    model::FlowSettings,
    notify::{Notification, Notifier},
    runtime::Context,
    store::data::NodeRunStatus,
    workflow::{
        actions::ActionInput,
        node::Node,
        template,
    },
};

/// Terminal result of a node as seen by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// The node output.
    Completed(Value),
    /// Retries exhausted or a non retryable error.
    Failed(String),
    /// The execution was stopped while the node was running.
    Stopped,
}

pub struct NodeRunner {
    ctx: Arc<Context>,
    tracker: Arc<Tracker>,
    notifier: Arc<dyn Notifier>,
    retry_on_failure: bool,
    retry_count: u32,
    backoff_base: Duration,
}

impl NodeRunner {
    pub fn new(
        ctx: Arc<Context>,
        tracker: Arc<Tracker>,
        notifier: Arc<dyn Notifier>,
        settings: &FlowSettings,
        backoff_base: Duration,
    ) -> Self {
        Self {
            ctx,
            tracker,
            notifier,
            retry_on_failure: settings.retry_on_failure,
            retry_count: settings.retry_count,
            backoff_base,
        }
    }

    pub async fn run(
        &self,
        node: &Node,
    ) -> NodeOutcome {
        let nid = node.id.clone();
        self.tracker.node_started(&nid);

        let input = match node.action.input() {
            Some(input) => match template::resolve_json_value(&self.ctx, &nid, input) {
                Ok(input) => input,
                Err(err) => {
                    let message = format!("node '{}' failed: {}", nid, err);
                    self.tracker.node_failed(&nid, &message);
                    return NodeOutcome::Failed(message);
                }
            },
            None => json!({}),
        };
        self.tracker.node_input(&nid, &input);

        let max_retries = node.max_retries(self.retry_on_failure, self.retry_count);
        let mut attempt = 0;
        loop {
            let action_input = ActionInput {
                nid: nid.clone(),
                attempt,
                input: input.clone(),
                custom_attributes: node.custom_attributes.clone(),
            };

            let ret = tokio::select! {
                _ = self.ctx.wait_shutdown() => return NodeOutcome::Stopped,
                ret = Self::attempt(self.ctx.clone(), node, action_input) => ret,
            };

            match ret {
                Ok(output) => {
                    let output: Value = output.into();
                    self.ctx.add_output(nid.clone(), Vars::from(output.clone()));
                    self.tracker.node_completed(&nid, &output);
                    self.notify(node, &output);
                    return NodeOutcome::Completed(output);
                }
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    let wait = backoff(self.backoff_base, attempt);
                    warn!(execution_id = self.ctx.execution_id(), node_id = %nid, attempt, error = %err, "node attempt failed, retrying in {:?}", wait);

                    tokio::select! {
                        _ = self.ctx.wait_shutdown() => return NodeOutcome::Stopped,
                        _ = tokio::time::sleep(wait) => {}
                    }
                    attempt += 1;
                    self.tracker.node_retry(&nid, attempt);
                }
                Err(err) => {
                    let message = format!("node '{}' failed after {} attempt(s): {}", nid, attempt + 1, err);
                    self.tracker.node_failed(&nid, &message);
                    return NodeOutcome::Failed(message);
                }
            }
        }
    }

    async fn attempt(
        ctx: Arc<Context>,
        node: &Node,
        input: ActionInput,
    ) -> Result<Vars> {
        let Some(timeout) = node.timeout else {
            return node.action.run(ctx, input).await;
        };

        match tokio::time::timeout(timeout, node.action.run(ctx, input)).await {
            Ok(ret) => ret,
            Err(_) => Err(FlowError::Invocation {
                message: format!("attempt timed out after {} seconds", timeout.as_secs()),
                retryable: true,
            }),
        }
    }

    fn notify(
        &self,
        node: &Node,
        output: &Value,
    ) {
        for target in node.notify.iter() {
            let notifier = self.notifier.clone();
            let target = target.clone();
            let notification = Notification {
                execution_id: self.ctx.execution_id().to_string(),
                flow_id: self.ctx.flow_id().to_string(),
                tenant_id: self.ctx.tenant_id().to_string(),
                node_id: node.id.clone(),
                status: NodeRunStatus::Completed.as_ref().to_string(),
                output: output.clone(),
                custom_attributes: node.custom_attributes.clone(),
            };

            tokio::spawn(async move {
                match notifier.notify(&target, &notification).await {
                    Ok(_) => debug!(execution_id = %notification.execution_id, node_id = %notification.node_id, "notification sent"),
                    Err(err) => warn!(execution_id = %notification.execution_id, node_id = %notification.node_id, error = %err, "notification failed"),
                }
            });
        }
    }
}

/// Wait before retrying after the 0-based attempt `attempt` failed,
/// `base * 2^attempt`.
pub(crate) fn backoff(
    base: Duration,
    attempt: u32,
) -> Duration {
    base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}
