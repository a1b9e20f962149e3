use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, SessionId};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for per-session change notifications. Callers subscribe to a
/// session and receive every applied event, including promotions triggered by
/// other people's cancellations.
pub struct NotifyHub {
    channels: DashMap<SessionId, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a session. Creates the channel if needed.
    pub fn subscribe(&self, session_id: SessionId) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, session_id: SessionId, event: &Event) {
        if let Some(sender) = self.channels.get(&session_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel.
    pub fn remove(&self, session_id: &SessionId) {
        self.channels.remove(session_id);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
