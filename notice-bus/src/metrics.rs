//! Prometheus metrics for notice bus

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Total messages offered to the queue
    pub static ref NOTICE_PUBLISH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notice_bus_publish_total",
        "Total notifications offered to the queue",
        &["notification_type", "status"]
    )
    .unwrap();

    /// Total messages taken off the queue by the consumer
    pub static ref NOTICE_CONSUME_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notice_bus_consume_total",
        "Total notifications handled by the consumer",
        &["notification_type", "status"]
    )
    .unwrap();
}
