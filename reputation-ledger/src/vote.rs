//! Vote state machine
//!
//! Each `(actor, object)` pair is `neutral`, `up` or `down`. A cast vote
//! occupies the actor's `<kind>.vote_up|vote_down` slot and, for questions
//! and answers, the owner's `<kind>.voted_up|voted_down` slot. Switching
//! direction first retracts the opposite vote in its own transaction.

use crate::{
    activity,
    content,
    counter::{self, Counter},
    ledger::ReputationLedger,
    registry::ActivityDef,
    types::{Action, ActivityKey, ObjectId, ObjectKind, UserId, VoteStatus, VoteTally},
    Error, Result,
};
use notice_bus::NotificationMsg;

/// Vote direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Up-vote
    Up,
    /// Down-vote
    Down,
}

impl Direction {
    fn cast(&self) -> Action {
        match self {
            Direction::Up => Action::VoteUp,
            Direction::Down => Action::VoteDown,
        }
    }

    fn received(&self) -> Action {
        match self {
            Direction::Up => Action::VotedUp,
            Direction::Down => Action::VotedDown,
        }
    }

    fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    fn count_delta(&self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    fn counter(&self) -> Counter {
        match self {
            Direction::Up => Counter::UpVotes,
            Direction::Down => Counter::DownVotes,
        }
    }
}

/// Resolved activities of one vote direction on one kind
struct VotePlan {
    kind: ObjectKind,
    cast: ActivityDef,
    received: Option<ActivityDef>,
}

impl ReputationLedger {
    /// Up-vote an object, retracting any down-vote by the same actor first
    pub async fn vote_up(&self, object_id: &ObjectId, actor: &UserId, owner: &UserId) -> Result<VoteTally> {
        self.vote(object_id, actor, owner, Direction::Up).await
    }

    /// Down-vote an object, retracting any up-vote by the same actor first
    pub async fn vote_down(&self, object_id: &ObjectId, actor: &UserId, owner: &UserId) -> Result<VoteTally> {
        self.vote(object_id, actor, owner, Direction::Down).await
    }

    /// Retract an up-vote
    pub async fn vote_up_cancel(
        &self,
        object_id: &ObjectId,
        actor: &UserId,
        owner: &UserId,
    ) -> Result<VoteTally> {
        self.unvote(object_id, actor, owner, Direction::Up).await
    }

    /// Retract a down-vote
    pub async fn vote_down_cancel(
        &self,
        object_id: &ObjectId,
        actor: &UserId,
        owner: &UserId,
    ) -> Result<VoteTally> {
        self.unvote(object_id, actor, owner, Direction::Down).await
    }

    /// Which vote the actor currently holds on an object
    ///
    /// Objects that cannot be voted on report [`VoteStatus::None`].
    pub fn get_vote_status(&self, object_id: &ObjectId, actor: &UserId) -> Result<VoteStatus> {
        match self.vote_tally(object_id, actor) {
            Ok(tally) => Ok(tally.vote_status),
            Err(Error::DisallowVote(_) | Error::ObjectNotFound(_)) => Ok(VoteStatus::None),
            Err(e) => Err(e),
        }
    }

    /// Active vote counts of an object plus the actor's own vote
    ///
    /// Counts come from the content record's counters; the actor's vote is a
    /// point lookup on their two cast slots.
    pub fn vote_tally(&self, object_id: &ObjectId, actor: &UserId) -> Result<VoteTally> {
        let up = self.vote_plan(object_id, Direction::Up)?.cast.activity_type;
        let down = self.vote_plan(object_id, Direction::Down)?.cast.activity_type;
        let record = content::require_content(self.storage(), object_id)?;

        let holds = |activity_type| -> Result<bool> {
            let key = ActivityKey::new(object_id.clone(), actor.clone(), actor, activity_type);
            Ok(activity::find_by_key(self.storage(), &key)?.is_some_and(|row| row.is_active()))
        };

        let vote_status = if holds(up)? {
            VoteStatus::Up
        } else if holds(down)? {
            VoteStatus::Down
        } else {
            VoteStatus::None
        };

        Ok(VoteTally {
            up_votes: u64::try_from(record.up_votes).unwrap_or(0),
            down_votes: u64::try_from(record.down_votes).unwrap_or(0),
            votes: record.vote_count,
            vote_status,
        })
    }

    async fn vote(
        &self,
        object_id: &ObjectId,
        actor: &UserId,
        owner: &UserId,
        direction: Direction,
    ) -> Result<VoteTally> {
        let plan = self.vote_plan(object_id, direction)?;

        // The opposite vote may not exist
        match self.vote_plan(object_id, direction.opposite()) {
            Ok(opposite) => match self.retract(&opposite, object_id, actor, owner, direction.opposite()) {
                Ok(notices) => self.dispatch(notices).await,
                Err(e) => tracing::warn!(
                    object_id = %object_id,
                    actor = %actor,
                    error = %e,
                    "Opposite vote not retracted"
                ),
            },
            Err(e) => tracing::debug!(object_id = %object_id, error = %e, "No opposite vote"),
        }

        let notices = self.cast(&plan, object_id, actor, owner, direction)?;
        self.dispatch(notices).await;

        self.vote_tally(object_id, actor)
    }

    async fn unvote(
        &self,
        object_id: &ObjectId,
        actor: &UserId,
        owner: &UserId,
        direction: Direction,
    ) -> Result<VoteTally> {
        let plan = self.vote_plan(object_id, direction)?;
        let notices = self.retract(&plan, object_id, actor, owner, direction)?;
        self.dispatch(notices).await;

        self.vote_tally(object_id, actor)
    }

    fn vote_plan(&self, object_id: &ObjectId, direction: Direction) -> Result<VotePlan> {
        let kind = self.kind_of(object_id)?;

        let received = match kind {
            ObjectKind::Question | ObjectKind::Answer => {
                Some(self.resolver.resolve(kind, direction.received())?)
            }
            ObjectKind::Comment => None,
            ObjectKind::Tag | ObjectKind::User => {
                return Err(Error::DisallowVote(format!("{} {}", kind, object_id)))
            }
        };

        Ok(VotePlan {
            kind,
            cast: self.resolver.resolve(kind, direction.cast())?,
            received,
        })
    }

    /// Apply a vote in one transaction; no-op when the actor already holds it
    fn cast(
        &self,
        plan: &VotePlan,
        object_id: &ObjectId,
        actor: &UserId,
        owner: &UserId,
        direction: Direction,
    ) -> Result<Vec<NotificationMsg>> {
        let mut tx = self.storage.begin();
        let mut notices = Vec::new();

        let cast_key = ActivityKey::new(object_id.clone(), actor.clone(), actor, plan.cast.activity_type);
        let Some((cast_row, cast_outcome)) =
            self.activate_slot(&mut tx, cast_key, object_id, plan.cast.rank, plan.cast.has_rank)?
        else {
            tracing::debug!(object_id = %object_id, actor = %actor, "Vote already active");
            return Ok(notices);
        };
        notices.extend(Self::achievement(&cast_row, plan.kind, cast_outcome.applied));

        if let Some(received) = &plan.received {
            // Voting on one's own content earns nothing
            let delta = if actor == owner { 0 } else { received.rank };
            let key = ActivityKey::new(object_id.clone(), owner.clone(), actor, received.activity_type);
            if let Some((row, outcome)) = self.activate_slot(&mut tx, key, object_id, delta, received.has_rank)? {
                notices.extend(Self::achievement(&row, plan.kind, outcome.applied));
            }
        }

        counter::increment(&mut tx, plan.kind, object_id, Counter::Votes, direction.count_delta())?;
        counter::increment(&mut tx, plan.kind, object_id, direction.counter(), 1)?;
        tx.commit()?;

        tracing::debug!(
            object_id = %object_id,
            actor = %actor,
            action = direction.cast().as_str(),
            "Vote applied"
        );

        Ok(notices)
    }

    /// Retract a vote in one transaction; no-op when the actor does not hold it
    fn retract(
        &self,
        plan: &VotePlan,
        object_id: &ObjectId,
        actor: &UserId,
        owner: &UserId,
        direction: Direction,
    ) -> Result<Vec<NotificationMsg>> {
        let mut tx = self.storage.begin();
        let mut notices = Vec::new();

        let cast_key = ActivityKey::new(object_id.clone(), actor.clone(), actor, plan.cast.activity_type);
        let Some((cast_row, cast_outcome)) = self.deactivate_slot(&mut tx, &cast_key)? else {
            return Ok(notices);
        };
        notices.extend(Self::achievement(&cast_row, plan.kind, cast_outcome.applied));

        if let Some(received) = &plan.received {
            let key = ActivityKey::new(object_id.clone(), owner.clone(), actor, received.activity_type);
            if let Some((row, outcome)) = self.deactivate_slot(&mut tx, &key)? {
                notices.extend(Self::achievement(&row, plan.kind, outcome.applied));
            }
        }

        counter::increment(&mut tx, plan.kind, object_id, Counter::Votes, -direction.count_delta())?;
        counter::increment(&mut tx, plan.kind, object_id, direction.counter(), -1)?;
        tx.commit()?;

        tracing::debug!(
            object_id = %object_id,
            actor = %actor,
            action = direction.cast().as_str(),
            "Vote retracted"
        );

        Ok(notices)
    }
}

#[cfg(test)]
mod tests {
    use crate::content;
    use crate::ledger::test_support::TestLedger;
    use crate::types::{ObjectKind, VoteStatus};
    use crate::Error;
    use notice_bus::NotificationType;

    #[tokio::test]
    async fn test_vote_up_rewards_owner() {
        let mut t = TestLedger::new();
        let alice = t.user("alice", 1);
        let bob = t.user("bob", 1);
        let question = t.content(ObjectKind::Question, 1, Some(&alice));
        let answer = t.answer(1, &question, &bob);

        let tally = t.ledger.vote_up(&answer, &alice, &bob).await.unwrap();

        assert_eq!(tally.up_votes, 1);
        assert_eq!(tally.votes, 1);
        assert_eq!(tally.vote_status, VoteStatus::Up);
        assert_eq!(t.rank(&bob), 11);
        assert_eq!(t.rank(&alice), 1);
        assert_eq!(content::require_content(t.ledger.storage(), &answer).unwrap().vote_count, 1);

        let notices = t.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].notification_type, NotificationType::Achievement);
        assert_eq!(notices[0].receiver_user_id, "bob");
        assert_eq!(notices[0].trigger_user_id.as_deref(), Some("alice"));
        assert_eq!(notices[0].rank, 10);
    }

    #[tokio::test]
    async fn test_tally_follows_counters_across_voters() {
        let t = TestLedger::new();
        let alice = t.user("alice", 1);
        let bob = t.user("bob", 1);
        let carol = t.user("carol", 1);
        let dave = t.user("dave", 1);
        let question = t.content(ObjectKind::Question, 1, Some(&alice));

        t.ledger.vote_up(&question, &bob, &alice).await.unwrap();
        t.ledger.vote_up(&question, &carol, &alice).await.unwrap();
        t.ledger.vote_down(&question, &dave, &alice).await.unwrap();
        // Switch from up to down
        let tally = t.ledger.vote_down(&question, &carol, &alice).await.unwrap();

        assert_eq!((tally.up_votes, tally.down_votes, tally.votes), (1, 2, -1));
        assert_eq!(tally.vote_status, VoteStatus::Down);

        let record = content::require_content(t.ledger.storage(), &question).unwrap();
        assert_eq!((record.up_votes, record.down_votes, record.vote_count), (1, 2, -1));

        assert_eq!(t.ledger.get_vote_status(&question, &bob).unwrap(), VoteStatus::Up);
        assert_eq!(t.ledger.get_vote_status(&question, &alice).unwrap(), VoteStatus::None);

        let tally = t.ledger.vote_down_cancel(&question, &dave, &alice).await.unwrap();
        assert_eq!((tally.up_votes, tally.down_votes, tally.votes), (1, 1, 0));
        assert_eq!(tally.vote_status, VoteStatus::None);
    }

    #[tokio::test]
    async fn test_vote_up_twice_is_idempotent() {
        let t = TestLedger::new();
        let alice = t.user("alice", 1);
        let bob = t.user("bob", 1);
        let question = t.content(ObjectKind::Question, 1, Some(&bob));

        t.ledger.vote_up(&question, &alice, &bob).await.unwrap();
        let tally = t.ledger.vote_up(&question, &alice, &bob).await.unwrap();

        assert_eq!(tally.votes, 1);
        assert_eq!(t.rank(&bob), 11);
        assert_eq!(content::require_content(t.ledger.storage(), &question).unwrap().vote_count, 1);
    }

    #[tokio::test]
    async fn test_switch_direction() {
        let t = TestLedger::new();
        let alice = t.user("alice", 20);
        let bob = t.user("bob", 20);
        let question = t.content(ObjectKind::Question, 1, Some(&alice));
        let answer = t.answer(1, &question, &bob);

        t.ledger.vote_up(&answer, &alice, &bob).await.unwrap();
        let tally = t.ledger.vote_down(&answer, &alice, &bob).await.unwrap();

        assert_eq!(tally.up_votes, 0);
        assert_eq!(tally.down_votes, 1);
        assert_eq!(tally.vote_status, VoteStatus::Down);
        // +10 reverted, then -2 received; the voter pays 1 for the down-vote
        assert_eq!(t.rank(&bob), 18);
        assert_eq!(t.rank(&alice), 19);
        assert_eq!(content::require_content(t.ledger.storage(), &answer).unwrap().vote_count, -1);
    }

    #[tokio::test]
    async fn test_cancel_restores_rank() {
        let t = TestLedger::new();
        let alice = t.user("alice", 5);
        let bob = t.user("bob", 5);
        let question = t.content(ObjectKind::Question, 1, Some(&alice));
        let answer = t.answer(1, &question, &bob);

        t.ledger.vote_down(&answer, &alice, &bob).await.unwrap();
        assert_eq!(t.rank(&bob), 3);
        assert_eq!(t.rank(&alice), 4);

        let tally = t.ledger.vote_down_cancel(&answer, &alice, &bob).await.unwrap();
        assert_eq!(tally.votes, 0);
        assert_eq!(tally.vote_status, VoteStatus::None);
        assert_eq!(t.rank(&bob), 5);
        assert_eq!(t.rank(&alice), 5);

        // Cancelling again changes nothing
        t.ledger.vote_down_cancel(&answer, &alice, &bob).await.unwrap();
        assert_eq!(t.rank(&bob), 5);
        assert_eq!(content::require_content(t.ledger.storage(), &answer).unwrap().vote_count, 0);
    }

    #[tokio::test]
    async fn test_self_vote_earns_nothing() {
        let t = TestLedger::new();
        let bob = t.user("bob", 1);
        let question = t.content(ObjectKind::Question, 1, Some(&bob));

        let tally = t.ledger.vote_up(&question, &bob, &bob).await.unwrap();

        assert_eq!(tally.votes, 1);
        assert_eq!(t.rank(&bob), 1);
    }

    #[tokio::test]
    async fn test_comment_vote_has_no_received_side() {
        let t = TestLedger::new();
        let alice = t.user("alice", 1);
        let bob = t.user("bob", 1);
        let comment = t.content(ObjectKind::Comment, 1, Some(&bob));

        t.ledger.vote_up(&comment, &alice, &bob).await.unwrap();

        let rows = crate::activity::for_object(t.ledger.storage(), &comment).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, alice);
    }

    #[tokio::test]
    async fn test_ineligible_kind() {
        let t = TestLedger::new();
        let alice = t.user("alice", 1);
        let tag = t.content(ObjectKind::Tag, 1, None);

        let err = t.ledger.vote_up(&tag, &alice, &alice).await.unwrap_err();
        assert!(matches!(err, Error::DisallowVote(_)));
        assert!(crate::activity::all(t.ledger.storage()).unwrap().is_empty());
        assert_eq!(t.ledger.get_vote_status(&tag, &alice).unwrap(), VoteStatus::None);
    }

    #[tokio::test]
    async fn test_missing_content_rolls_back() {
        let t = TestLedger::new();
        let alice = t.user("alice", 1);
        let bob = t.user("bob", 1);
        let unregistered = crate::ObjectId::encode(ObjectKind::Answer, 77);

        let err = t.ledger.vote_up(&unregistered, &alice, &bob).await.unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound(_)));
        assert_eq!(t.rank(&bob), 1);
        assert!(crate::activity::all(t.ledger.storage()).unwrap().is_empty());
    }
}
