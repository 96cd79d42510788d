//! Main ledger orchestration layer
//!
//! This module ties together storage, the rank engine and the notification
//! queue into a high-level API. The operations themselves live next to their
//! rules: [`crate::vote`], [`crate::accept`], [`crate::follow`],
//! [`crate::rollback`] and [`crate::history`] each add an `impl` block to
//! [`ReputationLedger`].
//!
//! Every mutating operation opens exactly one transaction, performs the
//! ledger toggle, the rank change and the counter update inside it, commits,
//! and only then publishes its notifications.
//!
//! # Example
//!
//! ```no_run
//! use reputation_ledger::{Config, ObjectId, ReputationLedger, UserId};
//!
//! #[tokio::main]
//! async fn main() -> reputation_ledger::Result<()> {
//!     let (publisher, _subscriber) = notice_bus::channel(notice_bus::DEFAULT_CAPACITY);
//!     let ledger = ReputationLedger::open(Config::default(), publisher)?;
//!
//!     let answer = ObjectId::new("10020000000000001");
//!     let tally = ledger
//!         .vote_up(&answer, &UserId::new("alice"), &UserId::new("bob"))
//!         .await?;
//!     println!("{} votes", tally.votes);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    activity, content,
    metrics::Metrics,
    object::{EncodedIdResolver, ObjectKindResolver},
    rank::{RankEngine, RankOutcome},
    registry::{ActivityRegistry, ActivityResolver, ConfigLookup, StaticRegistry},
    storage::Storage,
    transaction::Transaction,
    types::{Activity, ActivityKey, ContentRecord, ObjectId, ObjectKind, UserRecord},
    Config, Error, Result,
};
use notice_bus::{NotificationMsg, Publisher};
use std::sync::Arc;

/// Main ledger interface
pub struct ReputationLedger {
    /// Durable store
    pub(crate) storage: Arc<Storage>,

    /// Activity key and delta resolution
    pub(crate) resolver: ActivityResolver,

    /// Object kind lookup
    pub(crate) kinds: Arc<dyn ObjectKindResolver>,

    /// Sole writer of `User.rank`
    pub(crate) rank: RankEngine,

    /// Metrics
    pub(crate) metrics: Metrics,

    /// Notification queue
    publisher: Publisher,

    /// Configuration
    config: Config,
}

impl ReputationLedger {
    /// Open ledger with configuration
    ///
    /// Uses the built-in activity registry, the configured rank table and
    /// the encoded-ID kind resolver; swap them with the `with_*` builders.
    pub fn open(config: Config, publisher: Publisher) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new().map_err(|e| Error::Other(format!("metrics: {}", e)))?;
        let resolver = ActivityResolver::new(
            Arc::new(StaticRegistry::default()),
            Arc::new(config.rank.clone()),
        );
        let rank = RankEngine::new(resolver.clone(), metrics.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            daily_rank_limit = config.rank.daily_rank_limit,
            "Reputation ledger opened"
        );

        Ok(Self {
            storage,
            resolver,
            kinds: Arc::new(EncodedIdResolver),
            rank,
            metrics,
            publisher,
            config,
        })
    }

    /// Set object kind resolver
    pub fn with_kind_resolver(mut self, kinds: Arc<dyn ObjectKindResolver>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Set activity registry
    pub fn with_registry(self, registry: Arc<dyn ActivityRegistry>) -> Self {
        let config = self.resolver.config_handle();
        self.with_resolver(ActivityResolver::new(registry, config))
    }

    /// Set config lookup (rank deltas, cap, exemptions)
    pub fn with_config_lookup(self, lookup: Arc<dyn ConfigLookup>) -> Self {
        let registry = self.resolver.registry_handle();
        self.with_resolver(ActivityResolver::new(registry, lookup))
    }

    fn with_resolver(mut self, resolver: ActivityResolver) -> Self {
        self.rank = RankEngine::new(resolver.clone(), self.metrics.clone());
        self.resolver = resolver;
        self
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Underlying store
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Register a user
    pub fn register_user(&self, user: UserRecord) -> Result<()> {
        let mut tx = self.storage.begin();
        if content::get_user(&tx, &user.id)?.is_some() {
            return Err(Error::InvalidRequest(format!("user {} already registered", user.id)));
        }
        content::put_user(&mut tx, &user)?;
        tx.commit()?;

        tracing::debug!(user_id = %user.id, rank = user.rank, "User registered");
        Ok(())
    }

    /// Register a piece of content
    ///
    /// An answer with a parent is linked under its question and bumps the
    /// question's `answer_count`.
    pub fn register_content(&self, record: ContentRecord) -> Result<()> {
        let mut tx = self.storage.begin();
        if content::get_content(&tx, &record.id)?.is_some() {
            return Err(Error::InvalidRequest(format!("content {} already registered", record.id)));
        }

        if let (ObjectKind::Answer, Some(parent_id)) = (record.kind, &record.parent_id) {
            let mut parent = content::require_content(&tx, parent_id)?;
            parent.answer_count += 1;
            content::put_content(&mut tx, &parent)?;
            content::link_child(&mut tx, parent_id, &record.id);
        }

        content::put_content(&mut tx, &record)?;
        tx.commit()?;

        tracing::debug!(object_id = %record.id, kind = %record.kind, "Content registered");
        Ok(())
    }

    /// Kind of an object, failing when it cannot be resolved
    pub(crate) fn kind_of(&self, object_id: &ObjectId) -> Result<ObjectKind> {
        self.kinds
            .kind_of(object_id)
            .ok_or_else(|| Error::ObjectNotFound(object_id.to_string()))
    }

    /// Reactivate or insert the row of a slot and apply its rank
    ///
    /// Returns `None` when the slot is already active. The row records the
    /// rank actually applied.
    pub(crate) fn activate_slot(
        &self,
        tx: &mut Transaction<'_>,
        key: ActivityKey,
        original_object_id: &ObjectId,
        delta: i64,
        has_rank: bool,
    ) -> Result<Option<(Activity, RankOutcome)>> {
        let existing = activity::find_by_key(tx, &key)?;
        if existing.as_ref().is_some_and(Activity::is_active) {
            return Ok(None);
        }

        let outcome = self.rank.apply(tx, &key.user_id, delta, key.activity_type)?;

        let row = match existing {
            Some(row) => {
                self.metrics.record_activity("reactivate");
                activity::reactivate(tx, row, outcome.applied)?
            }
            None => {
                let row = Activity::new(key, original_object_id.clone(), outcome.applied, has_rank);
                activity::insert(tx, &row)?;
                self.metrics.record_activity("insert");
                row
            }
        };

        Ok(Some((row, outcome)))
    }

    /// Cancel the active row of a slot and revert its recorded rank
    ///
    /// Returns `None` when the slot is empty or already cancelled.
    pub(crate) fn deactivate_slot(
        &self,
        tx: &mut Transaction<'_>,
        key: &ActivityKey,
    ) -> Result<Option<(Activity, RankOutcome)>> {
        match activity::find_by_key(tx, key)? {
            Some(row) if row.is_active() => self.cancel_row(tx, row).map(Some),
            _ => Ok(None),
        }
    }

    /// Revert and cancel an active row
    pub(crate) fn cancel_row(
        &self,
        tx: &mut Transaction<'_>,
        row: Activity,
    ) -> Result<(Activity, RankOutcome)> {
        let outcome = self.rank.revert(tx, &row.user_id, row.rank, row.activity_type)?;
        let row = activity::cancel(tx, row)?;
        self.metrics.record_activity("cancel");
        Ok((row, outcome))
    }

    /// Achievement message for a rank change that landed
    pub(crate) fn achievement(row: &Activity, kind: ObjectKind, applied: i64) -> Option<NotificationMsg> {
        if applied == 0 {
            return None;
        }

        let msg = NotificationMsg::achievement(row.user_id.as_str(), row.object_id.as_str(), kind.as_str())
            .with_rank(applied);
        Some(match &row.trigger_user_id {
            Some(trigger) => msg.with_trigger(trigger.as_str()),
            None => msg,
        })
    }

    /// Publish notifications of a committed operation
    ///
    /// Waits for queue capacity; failures are logged, never returned.
    pub(crate) async fn dispatch(&self, notices: Vec<NotificationMsg>) {
        for msg in notices {
            let receiver = msg.receiver_user_id.clone();
            if let Err(e) = self.publisher.publish(msg).await {
                tracing::error!(
                    receiver_user_id = %receiver,
                    error = %e,
                    "Dropped notification"
                );
            }
        }
    }

    /// Close the ledger
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.storage) {
            Ok(storage) => storage.close(),
            Err(_) => {
                tracing::warn!("Storage still shared, skipping explicit close");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for ReputationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReputationLedger")
            .field("storage", &self.storage)
            .field("service", &self.config.service_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use notice_bus::Subscriber;
    use tempfile::TempDir;

    /// Ledger over a temporary directory, plus the queue's receiving end
    pub(crate) struct TestLedger {
        pub ledger: ReputationLedger,
        pub notices: Subscriber,
        _temp: TempDir,
    }

    impl TestLedger {
        pub fn new() -> Self {
            Self::with_config(|_| {})
        }

        pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let mut config = Config::default();
            config.data_dir = temp_dir.path().to_path_buf();
            tweak(&mut config);

            let (publisher, notices) = notice_bus::channel(1024);
            let ledger = ReputationLedger::open(config, publisher).unwrap();
            Self {
                ledger,
                notices,
                _temp: temp_dir,
            }
        }

        pub fn user(&self, id: &str, rank: i64) -> crate::types::UserId {
            let user = crate::types::UserId::new(id);
            self.ledger
                .register_user(UserRecord::with_rank(user.clone(), rank))
                .unwrap();
            user
        }

        pub fn content(&self, kind: ObjectKind, seq: u64, owner: Option<&crate::types::UserId>) -> ObjectId {
            let id = ObjectId::encode(kind, seq);
            self.ledger
                .register_content(ContentRecord::new(id.clone(), kind, owner.cloned()))
                .unwrap();
            id
        }

        pub fn answer(&self, seq: u64, question: &ObjectId, owner: &crate::types::UserId) -> ObjectId {
            let id = ObjectId::encode(ObjectKind::Answer, seq);
            self.ledger
                .register_content(
                    ContentRecord::new(id.clone(), ObjectKind::Answer, Some(owner.clone()))
                        .with_parent(question.clone()),
                )
                .unwrap();
            id
        }

        pub fn rank(&self, user: &crate::types::UserId) -> i64 {
            self.ledger.user_rank(user).unwrap()
        }

        pub fn drain(&mut self) -> Vec<NotificationMsg> {
            std::iter::from_fn(|| self.notices.try_recv()).collect()
        }
    }
}
