//! Bounded FIFO of status-change events the worker loop consumes.
//!
//! Backed by `tokio::sync::mpsc` rather than a `Vec` behind a `Mutex`: the
//! single consumer just awaits `recv()`, and backpressure on `send` falls out
//! of the channel's own bounded capacity instead of a manual queue-full check.

use crate::models::{TaskId, TaskStatus};
use tokio::sync::mpsc;

/// `old`/`new` are `None` to represent "task deleted" / a synthetic
/// enqueue with no real prior status.
#[derive(Debug, Clone)]
pub struct StatusChangeEvent {
    pub task_id: TaskId,
    pub old_status: Option<TaskStatus>,
    pub new_status: Option<TaskStatus>,
}

pub struct EventQueue {
    sender: mpsc::Sender<StatusChangeEvent>,
}

pub struct EventQueueReceiver {
    receiver: mpsc::Receiver<StatusChangeEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> (Self, EventQueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, EventQueueReceiver { receiver })
    }

    /// Enqueues an event, waiting if the bounded queue is momentarily full.
    pub async fn push(&self, event: StatusChangeEvent) {
        if self.sender.send(event).await.is_err() {
            tracing::warn!("event queue has no live receiver, dropping event");
        }
    }
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl EventQueueReceiver {
    pub async fn recv(&mut self) -> Option<StatusChangeEvent> {
        self.receiver.recv().await
    }
}
