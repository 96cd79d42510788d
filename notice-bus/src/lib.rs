//! Notice Bus
//!
//! Bounded in-process queue that carries notification messages from the
//! reputation ledger to the delivery subsystem:
//! - Producers enqueue after their transaction commits
//! - Backpressure: `publish` waits once the queue is full
//! - A single consumer task drains the queue
//! - Delivery is attempted at most once, failures are logged and dropped
//!
//! # Example
//!
//! ```no_run
//! use notice_bus::{channel, MessageHandler, NotificationMsg};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl MessageHandler for Printer {
//!     async fn handle(&self, message: NotificationMsg) -> notice_bus::Result<()> {
//!         println!("{} -> {}", message.object_id, message.receiver_user_id);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> notice_bus::Result<()> {
//!     let (publisher, subscriber) = channel(128);
//!     let worker = subscriber.spawn(Arc::new(Printer));
//!
//!     publisher
//!         .publish(NotificationMsg::achievement("10040000000000001", "10020000000000001", "answer"))
//!         .await?;
//!
//!     drop(publisher);
//!     let _ = worker.await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;

pub use error::{Error, Result};
pub use message::{NotificationMsg, NotificationType};
pub use publisher::Publisher;
pub use subscriber::{MessageHandler, Subscriber};

use tokio::sync::mpsc;

/// Default queue capacity
pub const DEFAULT_CAPACITY: usize = 128;

/// Create a bounded notification queue
///
/// The publisher half is cheap to clone and is handed to every producer;
/// the subscriber half is owned by the single consumer.
pub fn channel(capacity: usize) -> (Publisher, Subscriber) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Publisher::new(tx), Subscriber::new(rx))
}
