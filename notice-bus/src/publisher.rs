//! Notification publisher

use crate::{message::NotificationMsg, metrics::NOTICE_PUBLISH_TOTAL, Error, Result};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Producer half of the notification queue
#[derive(Debug, Clone)]
pub struct Publisher {
    sender: mpsc::Sender<NotificationMsg>,
}

impl Publisher {
    /// Wrap a channel sender
    pub fn new(sender: mpsc::Sender<NotificationMsg>) -> Self {
        Self { sender }
    }

    /// Enqueue a message, waiting for capacity when the queue is full
    pub async fn publish(&self, message: NotificationMsg) -> Result<()> {
        let label = message.notification_type.as_str();
        debug!(
            id = %message.id,
            receiver = %message.receiver_user_id,
            object_id = %message.object_id,
            "Publishing notification"
        );

        let result = self.sender.send(message).await.map_err(|_| Error::Closed);
        Self::record(label, &result);
        result
    }

    /// Enqueue without waiting; fails with [`Error::Full`] at capacity
    pub fn try_publish(&self, message: NotificationMsg) -> Result<()> {
        let label = message.notification_type.as_str();
        let result = self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::Full,
            TrySendError::Closed(_) => Error::Closed,
        });
        Self::record(label, &result);
        result
    }

    /// Free slots left in the queue
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }

    /// True once the consumer half is gone
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn record(label: &str, result: &Result<()>) {
        let status = if result.is_ok() { "success" } else { "error" };
        NOTICE_PUBLISH_TOTAL.with_label_values(&[label, status]).inc();
    }
}
