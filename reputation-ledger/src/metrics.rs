//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `reputation_activities_total` - Ledger rows inserted, reactivated or cancelled, by action
//! - `reputation_rank_applied_total` - Sum of absolute rank deltas applied
//! - `reputation_rank_suppressed_total` - Rank changes reduced by the floor or dropped by the daily cap
//! - `reputation_rollback_rows_total` - Rows reversed by content deletion

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Ledger row transitions (`insert`, `reactivate`, `cancel`)
    pub activities_total: IntCounterVec,

    /// Absolute rank applied
    pub rank_applied_total: IntCounter,

    /// Suppressed rank changes (`daily_cap`, `floor`)
    pub rank_suppressed_total: IntCounterVec,

    /// Rows reversed by cascade rollback
    pub rollback_rows_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let activities_total = IntCounterVec::new(
            Opts::new(
                "reputation_activities_total",
                "Ledger rows inserted, reactivated or cancelled",
            ),
            &["action"],
        )?;
        registry.register(Box::new(activities_total.clone()))?;

        let rank_applied_total = IntCounter::new(
            "reputation_rank_applied_total",
            "Sum of absolute rank deltas applied",
        )?;
        registry.register(Box::new(rank_applied_total.clone()))?;

        let rank_suppressed_total = IntCounterVec::new(
            Opts::new(
                "reputation_rank_suppressed_total",
                "Rank changes reduced by the floor or dropped by the daily cap",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rank_suppressed_total.clone()))?;

        let rollback_rows_total = IntCounter::new(
            "reputation_rollback_rows_total",
            "Rows reversed by content deletion",
        )?;
        registry.register(Box::new(rollback_rows_total.clone()))?;

        Ok(Self {
            activities_total,
            rank_applied_total,
            rank_suppressed_total,
            rollback_rows_total,
            registry,
        })
    }

    /// Record a ledger row transition
    pub fn record_activity(&self, action: &str) {
        self.activities_total.with_label_values(&[action]).inc();
    }

    /// Record an applied rank delta
    pub fn record_rank_applied(&self, applied: i64) {
        self.rank_applied_total.inc_by(applied.unsigned_abs());
    }

    /// Record a suppressed rank change
    pub fn record_suppressed(&self, reason: &str) {
        self.rank_suppressed_total.with_label_values(&[reason]).inc();
    }

    /// Record rows reversed by a rollback
    pub fn record_rollback(&self, rows: usize) {
        self.rollback_rows_total.inc_by(rows as u64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("rank_applied_total", &self.rank_applied_total.get())
            .field("rollback_rows_total", &self.rollback_rows_total.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.rank_applied_total.get(), 0);
        assert_eq!(metrics.rollback_rows_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.record_activity("insert");
        assert_eq!(first.activities_total.with_label_values(&["insert"]).get(), 1);
        assert_eq!(second.activities_total.with_label_values(&["insert"]).get(), 0);
    }

    #[test]
    fn test_rank_applied_counts_magnitude() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rank_applied(10);
        metrics.record_rank_applied(-2);
        assert_eq!(metrics.rank_applied_total.get(), 12);
    }

    #[test]
    fn test_record_suppressed() {
        let metrics = Metrics::new().unwrap();
        metrics.record_suppressed("daily_cap");
        metrics.record_suppressed("daily_cap");
        metrics.record_suppressed("floor");
        assert_eq!(metrics.rank_suppressed_total.with_label_values(&["daily_cap"]).get(), 2);
        assert_eq!(metrics.rank_suppressed_total.with_label_values(&["floor"]).get(), 1);
    }
}
