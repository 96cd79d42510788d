//! Notification consumer
//!
//! One task drains the queue. Each message is handed to the handler exactly
//! once; a failing or panicking handler costs that message only.

use crate::{message::NotificationMsg, metrics::NOTICE_CONSUME_TOTAL, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Message handler trait
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Deliver one notification
    async fn handle(&self, message: NotificationMsg) -> Result<()>;
}

/// Consumer half of the notification queue
#[derive(Debug)]
pub struct Subscriber {
    receiver: mpsc::Receiver<NotificationMsg>,
}

impl Subscriber {
    /// Wrap a channel receiver
    pub fn new(receiver: mpsc::Receiver<NotificationMsg>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message (`None` once every publisher is gone)
    pub async fn recv(&mut self) -> Option<NotificationMsg> {
        self.receiver.recv().await
    }

    /// Take a message if one is queued
    pub fn try_recv(&mut self) -> Option<NotificationMsg> {
        self.receiver.try_recv().ok()
    }

    /// Run the consumer loop on its own task
    ///
    /// The task ends when all publishers are dropped and yields the number
    /// of messages delivered successfully.
    pub fn spawn<H>(self, handler: Arc<H>) -> JoinHandle<u64>
    where
        H: MessageHandler + 'static,
    {
        tokio::spawn(self.run(handler))
    }

    /// Drain the queue until it closes
    pub async fn run<H>(mut self, handler: Arc<H>) -> u64
    where
        H: MessageHandler + 'static,
    {
        info!("Notification consumer started");
        let mut delivered = 0u64;

        while let Some(message) = self.receiver.recv().await {
            let id = message.id;
            let label = message.notification_type.as_str();
            debug!(%id, "Received notification");

            let status = match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
                Ok(Ok(())) => {
                    delivered += 1;
                    "success"
                }
                Ok(Err(e)) => {
                    error!(%id, error = %e, "Notification dropped");
                    "error"
                }
                Err(_) => {
                    error!(%id, "Notification handler panicked, message dropped");
                    "panic"
                }
            };
            NOTICE_CONSUME_TOTAL.with_label_values(&[label, status]).inc();
        }

        info!(delivered, "Notification consumer stopped");
        delivered
    }
}
