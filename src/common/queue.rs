//! Message queues for inter-component communication.
//!
//! A point-to-point command [`Queue`] and a [`BroadcastQueue`] for events.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{FlowError, Result};

/// Bounded command queue, consumed by the dispatcher of one execution.
///
/// Senders never block: a message that does not fit is rejected.
pub struct Queue<T> {
    receiver: flume::Receiver<T>,
    sender: flume::Sender<T>,
}

impl<T> Queue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, receiver) = flume::bounded(cap);
        Arc::new(Self {
            receiver,
            sender,
        })
    }

    /// Enqueue `msg` without waiting for room.
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| FlowError::Queue(e.to_string()))
    }

    /// Next message, `None` once every sender is gone.
    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }
}

/// Broadcast queue for one-to-many message distribution.
///
/// Used for event broadcasting where all subscribers receive every message.
/// Backed by tokio's broadcast channel.
#[derive(Clone)]
pub struct BroadcastQueue<T> {
    sender: Arc<broadcast::Sender<T>>,
}

impl<T: Clone> BroadcastQueue<T> {
    /// create a new broadcast queue
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(cap);

        Arc::new(Self {
            sender: Arc::new(tx),
        })
    }

    /// send a message to the queue
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send(msg).map_err(|e| FlowError::Queue(e.to_string()))?;
        Ok(())
    }

    /// subscribe to the queue
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_rejects_when_full() {
        let queue = Queue::new(1);
        queue.send("cancel").unwrap();
        assert!(matches!(queue.send("cancel again"), Err(FlowError::Queue(_))));
        assert_eq!(queue.next_async().await, Some("cancel"));
        queue.send("later").unwrap();
    }
}
