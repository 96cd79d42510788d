//! Follow toggle
//!
//! One `<kind>.follow` row per `(object, follower)`, never rank-bearing.

use crate::{
    activity,
    counter::{self, Counter},
    ledger::ReputationLedger,
    types::{Action, ActivityKey, ObjectId, ObjectKind, UserId},
    Error, Result,
};

impl ReputationLedger {
    /// Follow a question, tag or user
    pub fn follow(&self, object_id: &ObjectId, actor: &UserId) -> Result<()> {
        self.toggle_follow(object_id, actor, true)
    }

    /// Stop following
    pub fn follow_cancel(&self, object_id: &ObjectId, actor: &UserId) -> Result<()> {
        self.toggle_follow(object_id, actor, false)
    }

    /// Whether `user` currently follows `object_id`
    pub fn is_following(&self, object_id: &ObjectId, user: &UserId) -> Result<bool> {
        let key = self.follow_key(object_id, user)?;
        Ok(activity::find_by_key(self.storage(), &key)?.is_some_and(|row| row.is_active()))
    }

    fn follow_key(&self, object_id: &ObjectId, actor: &UserId) -> Result<ActivityKey> {
        let kind = self.kind_of(object_id)?;
        if !matches!(kind, ObjectKind::Question | ObjectKind::Tag | ObjectKind::User) {
            return Err(Error::DisallowFollow(format!("{} {}", kind, object_id)));
        }

        let def = self.resolver.resolve(kind, Action::Follow)?;
        Ok(ActivityKey::new(object_id.clone(), actor.clone(), actor, def.activity_type))
    }

    fn toggle_follow(&self, object_id: &ObjectId, actor: &UserId, on: bool) -> Result<()> {
        let key = self.follow_key(object_id, actor)?;
        let kind = self.kind_of(object_id)?;

        let mut tx = self.storage.begin();
        let changed = if on {
            self.activate_slot(&mut tx, key, object_id, 0, false)?.is_some()
        } else {
            self.deactivate_slot(&mut tx, &key)?.is_some()
        };

        if !changed {
            return Ok(());
        }

        counter::increment(&mut tx, kind, object_id, Counter::Follows, if on { 1 } else { -1 })?;
        tx.commit()?;

        tracing::debug!(object_id = %object_id, actor = %actor, following = on, "Follow toggled");
        Ok(())
    }
}
