use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Notification;

const CHANNEL_CAPACITY: usize = 256;

/// Live delivery of notifications, one broadcast channel per recipient.
///
/// Delivery is best effort: the durable copy lives in the engine and is
/// what `unread_notifications` reads.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a principal's notifications. Creates the channel if needed.
    pub fn subscribe(&self, principal_id: &str) -> broadcast::Receiver<Notification> {
        self.channels
            .entry(principal_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, notification: &Notification) {
        if let Some(sender) = self.channels.get(&notification.recipient) {
            let _ = sender.send(notification.clone());
        }
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
        before - self.channels.len()
    }
}
