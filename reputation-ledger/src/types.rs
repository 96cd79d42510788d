//! Core types for the reputation ledger
//!
//! All persisted types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (rank deltas are plain `i64`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Content identifier (question, answer, comment, tag or user)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    /// Create new object ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an ID carrying its kind: `1` + 3-digit kind code + 13-digit sequence
    pub fn encode(kind: ObjectKind, seq: u64) -> Self {
        Self(format!("1{:03}{:013}", kind.code(), seq))
    }

    /// Kind embedded in an encoded ID
    pub fn encoded_kind(&self) -> Option<ObjectKind> {
        let id = self.0.as_str();
        if id.len() < 5 || !id.starts_with('1') || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        id[1..4].parse::<u8>().ok().and_then(ObjectKind::from_code)
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of content an object ID refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectKind {
    /// Question
    Question = 1,
    /// Answer to a question
    Answer = 2,
    /// Tag
    Tag = 3,
    /// User profile
    User = 4,
    /// Comment on a question or answer
    Comment = 5,
}

impl ObjectKind {
    /// Numeric code used in encoded IDs
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Kind from its numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectKind::Question),
            2 => Some(ObjectKind::Answer),
            3 => Some(ObjectKind::Tag),
            4 => Some(ObjectKind::User),
            5 => Some(ObjectKind::Comment),
            _ => None,
        }
    }

    /// Key segment used in activity keys (`question.vote_up`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Question => "question",
            ObjectKind::Answer => "answer",
            ObjectKind::Tag => "tag",
            ObjectKind::User => "user",
            ObjectKind::Comment => "comment",
        }
    }

    /// Parse from key segment
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "question" => Some(ObjectKind::Question),
            "answer" => Some(ObjectKind::Answer),
            "tag" => Some(ObjectKind::Tag),
            "user" => Some(ObjectKind::User),
            "comment" => Some(ObjectKind::Comment),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reputation-relevant action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Cast an up-vote
    VoteUp,
    /// Received an up-vote
    VotedUp,
    /// Cast a down-vote
    VoteDown,
    /// Received a down-vote
    VotedDown,
    /// Accepted an answer (asker side)
    Accept,
    /// Answer got accepted (answerer side)
    Accepted,
    /// Followed an object
    Follow,
}

impl Action {
    /// Key segment used in activity keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::VoteUp => "vote_up",
            Action::VotedUp => "voted_up",
            Action::VoteDown => "vote_down",
            Action::VotedDown => "voted_down",
            Action::Accept => "accept",
            Action::Accepted => "accepted",
            Action::Follow => "follow",
        }
    }

    /// Whether the row belongs to the content owner rather than the actor
    pub fn is_received(&self) -> bool {
        matches!(self, Action::VotedUp | Action::VotedDown)
    }

    /// Full activity key for a kind, e.g. `answer.voted_up`
    pub fn key(&self, kind: ObjectKind) -> String {
        format!("{}.{}", kind.as_str(), self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer activity type code resolved from an activity key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityType(pub u32);

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger row ID (UUIDv7, time-ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityId(pub Uuid);

impl ActivityId {
    /// Fresh time-ordered ID
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Toggle state of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActivityState {
    /// Counts toward rank, tallies and statuses
    Active = 0,
    /// Soft-deleted; kept as audit trail
    Cancelled = 1,
}

/// Identity of a ledger slot: at most one row exists per key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityKey {
    /// Targeted content
    pub object_id: ObjectId,
    /// User whose rank the row affects
    pub user_id: UserId,
    /// Acting user, `None` when acting on oneself
    pub trigger_user_id: Option<UserId>,
    /// Activity type code
    pub activity_type: ActivityType,
}

impl ActivityKey {
    /// Build a key, dropping the trigger user when it equals the affected user
    pub fn new(
        object_id: ObjectId,
        user_id: UserId,
        actor: &UserId,
        activity_type: ActivityType,
    ) -> Self {
        let trigger_user_id = (actor != &user_id).then(|| actor.clone());
        Self {
            object_id,
            user_id,
            trigger_user_id,
            activity_type,
        }
    }
}

/// Ledger row: one auditable reputation-relevant action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique row ID
    pub id: ActivityId,

    /// Content the action targets
    pub object_id: ObjectId,

    /// Content anchoring the context of the action
    pub original_object_id: ObjectId,

    /// User whose rank this row affects
    pub user_id: UserId,

    /// Acting user, `None` for self-actions
    pub trigger_user_id: Option<UserId>,

    /// Activity type code
    pub activity_type: ActivityType,

    /// Rank delta actually applied for this row
    pub rank: i64,

    /// Whether the activity type carries a rank effect at all
    pub has_rank: bool,

    /// Active or cancelled
    pub state: ActivityState,

    /// Last cancellation time (kept across reactivation)
    pub cancelled_at: Option<DateTime<Utc>>,

    /// First occurrence
    pub created_at: DateTime<Utc>,

    /// Last toggle
    pub updated_at: DateTime<Utc>,

    /// Optional link to a content revision
    pub revision_id: Option<String>,
}

impl Activity {
    /// New active row for a slot
    pub fn new(key: ActivityKey, original_object_id: ObjectId, rank: i64, has_rank: bool) -> Self {
        let now = Utc::now();
        Self {
            id: ActivityId::generate(),
            object_id: key.object_id,
            original_object_id,
            user_id: key.user_id,
            trigger_user_id: key.trigger_user_id,
            activity_type: key.activity_type,
            rank,
            has_rank,
            state: ActivityState::Active,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            revision_id: None,
        }
    }

    /// Slot this row occupies
    pub fn key(&self) -> ActivityKey {
        ActivityKey {
            object_id: self.object_id.clone(),
            user_id: self.user_id.clone(),
            trigger_user_id: self.trigger_user_id.clone(),
            activity_type: self.activity_type,
        }
    }

    /// Check if the row is active
    pub fn is_active(&self) -> bool {
        self.state == ActivityState::Active
    }
}

/// Persisted user state owned by the rank engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID
    pub id: UserId,

    /// Current reputation, never below 1
    pub rank: i64,

    /// Number of followers
    pub follow_count: i64,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Fresh user at the minimum rank
    pub fn new(id: UserId) -> Self {
        Self::with_rank(id, 1)
    }

    /// User with a given starting rank
    pub fn with_rank(id: UserId, rank: i64) -> Self {
        Self {
            id,
            rank: rank.max(1),
            follow_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Persisted counters of a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Object ID
    pub id: ObjectId,

    /// Kind of content
    pub kind: ObjectKind,

    /// Author (absent for tags)
    pub owner_id: Option<UserId>,

    /// Parent question of an answer
    pub parent_id: Option<ObjectId>,

    /// Net votes
    pub vote_count: i64,

    /// Active up votes
    pub up_votes: i64,

    /// Active down votes
    pub down_votes: i64,

    /// Number of followers
    pub follow_count: i64,

    /// Number of answers (questions only)
    pub answer_count: i64,

    /// Currently accepted answer (questions only)
    pub accepted_answer_id: Option<ObjectId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ContentRecord {
    /// New content record with zeroed counters
    pub fn new(id: ObjectId, kind: ObjectKind, owner_id: Option<UserId>) -> Self {
        Self {
            id,
            kind,
            owner_id,
            parent_id: None,
            vote_count: 0,
            up_votes: 0,
            down_votes: 0,
            follow_count: 0,
            answer_count: 0,
            accepted_answer_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach to a parent (answer -> question)
    pub fn with_parent(mut self, parent_id: ObjectId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Which vote an actor currently holds on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteStatus {
    /// No active vote
    None,
    /// Active up-vote
    Up,
    /// Active down-vote
    Down,
}

impl VoteStatus {
    /// Wire form: `vote_up`, `vote_down` or empty
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteStatus::None => "",
            VoteStatus::Up => "vote_up",
            VoteStatus::Down => "vote_down",
        }
    }
}

/// Vote totals of an object as seen from one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Active up-votes
    pub up_votes: u64,
    /// Active down-votes
    pub down_votes: u64,
    /// `up_votes - down_votes`
    pub votes: i64,
    /// The actor's own vote
    pub vote_status: VoteStatus,
}

/// One page of a listing plus the total row count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Rows across all pages
    pub total: u64,
}

impl<T> Page<T> {
    /// Cut a page out of a full, already ordered listing (pages start at 1)
    pub fn slice(all: Vec<T>, page: usize, page_size: usize) -> Self {
        let total = all.len() as u64;
        let page_size = page_size.max(1);
        let skip = page.max(1).saturating_sub(1).saturating_mul(page_size);
        let items = all.into_iter().skip(skip).take(page_size).collect();
        Self { items, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_object_kind() {
        let answer = ObjectId::encode(ObjectKind::Answer, 7);
        assert_eq!(answer.as_str(), "10020000000000007");
        assert_eq!(answer.encoded_kind(), Some(ObjectKind::Answer));

        assert_eq!(ObjectId::new("10990000000000001").encoded_kind(), None);
        assert_eq!(ObjectId::new("not-an-id").encoded_kind(), None);
    }

    #[test]
    fn test_activity_key_drops_self_trigger() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let object = ObjectId::new("q");

        let own = ActivityKey::new(object.clone(), alice.clone(), &alice, ActivityType(1));
        assert!(own.trigger_user_id.is_none());

        let other = ActivityKey::new(object, bob, &alice, ActivityType(1));
        assert_eq!(other.trigger_user_id, Some(alice));
    }

    #[test]
    fn test_action_keys() {
        assert_eq!(Action::VotedUp.key(ObjectKind::Answer), "answer.voted_up");
        assert!(Action::VotedDown.is_received());
        assert!(!Action::Accept.is_received());
    }

    #[test]
    fn test_user_rank_floor_on_create() {
        assert_eq!(UserRecord::with_rank(UserId::new("u"), -5).rank, 1);
    }

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=7).collect::<Vec<_>>(), 2, 3);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);

        let past_end = Page::slice((1..=2).collect::<Vec<_>>(), 5, 3);
        assert!(past_end.items.is_empty());
    }
}
