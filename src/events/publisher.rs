use crate::models::QueryTaskNotification;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Outbound channel announcing new tasks to the executor tier.
///
/// Publication is fire-and-forget from the caller's side: an error only tells
/// the caller the message was not enqueued, the task itself stays persisted.
#[async_trait]
pub trait TaskNotifier: Send + Sync {
    async fn publish(&self, notification: QueryTaskNotification) -> Result<(), PublishError>;
}

/// Task notifier backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<QueryTaskNotification>,
}

impl BroadcastNotifier {
    /// Create a new notifier with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to task notifications
    pub fn subscribe(&self) -> broadcast::Receiver<QueryTaskNotification> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl TaskNotifier for BroadcastNotifier {
    async fn publish(&self, notification: QueryTaskNotification) -> Result<(), PublishError> {
        // No subscribers yet is fine: executors reconcile from the store
        match self.sender.send(notification) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(crate::constants::defaults::NOTIFICATION_CHANNEL_CAPACITY)
    }
}

/// Error types for notification publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Notification channel is closed")]
    ChannelClosed,
}
