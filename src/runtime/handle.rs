use std::sync::Arc;

use crate::common::{Queue, Shutdown};

const COMMAND_QUEUE_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub enum ExecutionCommand {
    Cancel(String),
}

/// Live handle of a running execution, held by the engine until it finishes.
pub struct ExecutionHandle {
    id: String,
    flow_id: String,
    command_queue: Arc<Queue<ExecutionCommand>>,
    done: Shutdown,
}

impl ExecutionHandle {
    pub fn new(
        id: &str,
        flow_id: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            flow_id: flow_id.to_string(),
            command_queue: Queue::new(COMMAND_QUEUE_SIZE),
            done: Shutdown::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn command_queue(&self) -> Arc<Queue<ExecutionCommand>> {
        self.command_queue.clone()
    }

    pub fn cancel(
        &self,
        reason: &str,
    ) {
        let _ = self.command_queue.send(ExecutionCommand::Cancel(reason.to_string()));
    }

    /// Mark the execution finished and wake every waiter.
    pub fn finish(&self) {
        self.done.shutdown();
    }

    /// Resolves once the execution has reached a terminal state.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        self.done.wait()
    }
}
