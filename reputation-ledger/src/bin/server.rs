//! Reputation ledger server binary
//!
//! Opens the ledger and runs the notification consumer until Ctrl-C.

use async_trait::async_trait;
use notice_bus::{MessageHandler, NotificationMsg};
use reputation_ledger::{Config, ReputationLedger};
use std::sync::Arc;

/// Logs every notification as JSON
struct LogHandler;

#[async_trait]
impl MessageHandler for LogHandler {
    async fn handle(&self, message: NotificationMsg) -> notice_bus::Result<()> {
        let payload = serde_json::to_string(&message)?;
        tracing::info!(
            notification_type = message.notification_type.as_str(),
            receiver_user_id = %message.receiver_user_id,
            %payload,
            "Notification"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting reputation ledger server");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_env()?,
    };

    let (publisher, subscriber) = notice_bus::channel(config.notification.queue_capacity);
    let consumer = subscriber.spawn(Arc::new(LogHandler));

    // Open ledger
    let ledger = ReputationLedger::open(config, publisher)?;
    tracing::info!(data_dir = ?ledger.config().data_dir, "Ledger opened successfully");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down reputation ledger server");
    ledger.close()?;

    // Dropping the ledger closed the last publisher; the consumer drains and exits
    let delivered = consumer.await?;
    tracing::info!(delivered, "Notification consumer stopped");
    Ok(())
}
