//! Bounded replay buffer + subscriber fan-out for agent updates.
//!
//! New subscribers (the TUI reconnecting, a late-attaching test) get the
//! buffered tail of recent updates before they start receiving live ones,
//! so a subscriber that attaches mid-turn doesn't miss the thinking/tool-call
//! trail that already happened.

use super::AgentUpdate;
use std::collections::VecDeque;
use tokio::sync::{mpsc, Mutex};

pub struct MessageBus {
    replay: Mutex<VecDeque<AgentUpdate>>,
    replay_capacity: usize,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AgentUpdate>>>,
}

impl MessageBus {
    pub fn new(replay_capacity: usize) -> Self {
        Self {
            replay: Mutex::new(VecDeque::with_capacity(replay_capacity)),
            replay_capacity,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Publishes an update to all current subscribers and, unless it is a
    /// permission request, appends it to the replay buffer, evicting the
    /// oldest entry once the buffer is full. Permission requests are never
    /// buffered: replaying one to a late subscriber would offer to answer a
    /// request whose asker may already have timed out or moved on.
    pub async fn publish(&self, update: AgentUpdate) {
        if !matches!(update, AgentUpdate::RequestPermission(_)) {
            let mut replay = self.replay.lock().await;
            if replay.len() >= self.replay_capacity {
                replay.pop_front();
            }
            replay.push_back(update.clone());
        }

        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }

    /// Subscribes for live updates, first replaying whatever is currently
    /// buffered.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<AgentUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();

        let replay = self.replay.lock().await;
        for update in replay.iter() {
            // Receiver was just created; send cannot fail here.
            let _ = tx.send(update.clone());
        }
        drop(replay);

        self.subscribers.lock().await.push(tx);
        rx
    }
}
