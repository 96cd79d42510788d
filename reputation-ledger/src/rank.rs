//! Rank engine
//!
//! The only writer of `User.rank`. Every change runs inside the caller's
//! transaction and is bounded by two rules:
//!
//! - **Floor**: rank never drops below 1. A loss that would cross the floor
//!   is clamped and only the amount actually removed is applied.
//! - **Daily cap**: a gain is dropped entirely once the user's active rows
//!   updated today already sum to `daily_rank_limit`, unless the activity
//!   key is listed in `daily_rank_limit.exclude`.
//!
//! Callers record [`RankOutcome::applied`] on the ledger row, which keeps the
//! sum of active rows equal to the rank the user actually gained.

use crate::activity;
use crate::config::{DAILY_RANK_LIMIT, DAILY_RANK_LIMIT_EXCLUDE};
use crate::content;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::registry::ActivityResolver;
use crate::transaction::Transaction;
use crate::types::{ActivityType, UserId};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Why a rank change was reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Gain dropped by the daily cap
    DailyCap,
    /// Loss clamped at rank 1
    Floor,
}

impl Suppression {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Suppression::DailyCap => "daily_cap",
            Suppression::Floor => "floor",
        }
    }
}

/// Effect of one rank change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankOutcome {
    /// Delta actually added to the user's rank
    pub applied: i64,
    /// Set when the requested delta was reduced
    pub suppression: Option<Suppression>,
}

impl RankOutcome {
    /// Whether the floor or the cap fired
    pub fn suppressed(&self) -> bool {
        self.suppression.is_some()
    }
}

/// Applies and reverses rank deltas
#[derive(Debug, Clone)]
pub struct RankEngine {
    resolver: ActivityResolver,
    metrics: Metrics,
}

impl RankEngine {
    /// Create engine
    pub fn new(resolver: ActivityResolver, metrics: Metrics) -> Self {
        Self { resolver, metrics }
    }

    /// Apply a configured delta for a newly activated row
    pub fn apply(
        &self,
        tx: &mut Transaction<'_>,
        user_id: &UserId,
        delta: i64,
        activity_type: ActivityType,
    ) -> Result<RankOutcome> {
        let capped = delta > 0 && !self.is_cap_exempt(activity_type)?;
        self.change(tx, user_id, delta, capped)
    }

    /// Reverse the amount recorded on a row being cancelled
    ///
    /// Reversals never hit the daily cap but still respect the floor.
    pub fn revert(
        &self,
        tx: &mut Transaction<'_>,
        user_id: &UserId,
        recorded: i64,
        activity_type: ActivityType,
    ) -> Result<RankOutcome> {
        let outcome = self.change(tx, user_id, -recorded, false)?;

        tracing::debug!(
            user_id = %user_id,
            activity_type = %activity_type,
            recorded,
            applied = outcome.applied,
            "Rank reverted"
        );

        Ok(outcome)
    }

    fn change(&self, tx: &mut Transaction<'_>, user_id: &UserId, delta: i64, capped: bool) -> Result<RankOutcome> {
        if delta == 0 {
            return Ok(RankOutcome::default());
        }

        let mut user = content::require_user(tx, user_id)?;

        let outcome = if delta < 0 && user.rank + delta < 1 {
            RankOutcome {
                applied: 1 - user.rank,
                suppression: Some(Suppression::Floor),
            }
        } else if capped && self.earned_today(tx, user_id)? >= self.daily_limit()? {
            RankOutcome {
                applied: 0,
                suppression: Some(Suppression::DailyCap),
            }
        } else {
            RankOutcome {
                applied: delta,
                suppression: None,
            }
        };

        if outcome.applied != 0 {
            user.rank += outcome.applied;
            content::put_user(tx, &user)?;
            self.metrics.record_rank_applied(outcome.applied);
        }

        if let Some(suppression) = outcome.suppression {
            self.metrics.record_suppressed(suppression.as_str());
            tracing::debug!(
                user_id = %user_id,
                delta,
                applied = outcome.applied,
                reason = suppression.as_str(),
                "Rank change suppressed"
            );
        }

        Ok(outcome)
    }

    fn is_cap_exempt(&self, activity_type: ActivityType) -> Result<bool> {
        let Some(key) = self.resolver.registry().key_of(activity_type) else {
            return Ok(false);
        };

        let exempt = match self.resolver.config().get_array_string(DAILY_RANK_LIMIT_EXCLUDE) {
            Ok(keys) => keys,
            Err(Error::Config(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        Ok(exempt.iter().any(|k| k == key))
    }

    fn daily_limit(&self) -> Result<i64> {
        self.resolver.config().get_int(DAILY_RANK_LIMIT)
    }

    fn earned_today(&self, tx: &Transaction<'_>, user_id: &UserId) -> Result<i64> {
        let (start, end) = today_utc(Utc::now())?;
        activity::sum_rank_between(tx, user_id, start, end)
    }
}

/// UTC calendar day containing `now`, both ends inclusive
pub fn today_utc(now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Other("invalid start of day".to_string()))?;
    let start = Utc.from_utc_datetime(&midnight);
    let end = start + Duration::days(1) - Duration::nanoseconds(1);
    Ok((start, end))
}
