// src/notify/realtime.rs

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::models::Notification;

/// In-process fan-out of persisted notifications to live WebSocket sessions.
/// Slow subscribers lag and drop events; delivery is best effort.
#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<Arc<Notification>>,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many live sessions saw the event.
    pub fn publish(&self, notification: Notification) -> usize {
        self.tx.send(Arc::new(notification)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.tx.subscribe()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationKind, Party};
    use chrono::Utc;
    use uuid::Uuid;

    fn notification(receiver: Party) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            receiver,
            sender: Party::hotel(Uuid::new_v4()),
            message: "Your booking is confirmed".into(),
            kind: NotificationKind::BookingConfirmation,
            is_read: false,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        let hub = RealtimeHub::default();
        assert_eq!(hub.publish(notification(Party::customer(Uuid::new_v4()))), 0);
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_event() {
        let hub = RealtimeHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let receiver = Party::customer(Uuid::new_v4());

        assert_eq!(hub.publish(notification(receiver)), 2);
        assert_eq!(a.recv().await.unwrap().receiver, receiver);
        assert_eq!(b.recv().await.unwrap().receiver, receiver);
    }
}
