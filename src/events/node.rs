#[derive(Debug, Clone)]
pub enum NodeEvent {
    Running(i64),
    /// A failed attempt is about to be retried; carries the next attempt index.
    Retry(u32),
    Skipped,
    Completed(i64),
    Failed(String),
    Stopped(i64),
}

impl NodeEvent {
    pub fn str(&self) -> &str {
        match self {
            NodeEvent::Running(_) => "Running",
            NodeEvent::Retry(_) => "Retry",
            NodeEvent::Skipped => "Skipped",
            NodeEvent::Completed(_) => "Completed",
            NodeEvent::Failed(_) => "Failed",
            NodeEvent::Stopped(_) => "Stopped",
        }
    }
}
