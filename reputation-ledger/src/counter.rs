//! Content counters
//!
//! Counter updates are dispatched on the object kind. Vote counters (net, up
//! and down) live on question, answer and comment records. Follower counts
//! live on question and tag records, and on the user record for user follows.

use crate::content;
use crate::error::{Error, Result};
use crate::transaction::Transaction;
use crate::types::{ObjectId, ObjectKind, UserId};
use std::fmt;

/// Counter kept next to a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Net votes
    Votes,
    /// Active up votes
    UpVotes,
    /// Active down votes
    DownVotes,
    /// Followers
    Follows,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counter::Votes => f.write_str("vote_count"),
            Counter::UpVotes => f.write_str("up_votes"),
            Counter::DownVotes => f.write_str("down_votes"),
            Counter::Follows => f.write_str("follow_count"),
        }
    }
}

/// Where a counter is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    ContentVotes,
    ContentFollows,
    UserFollows,
}

impl Target {
    fn of(kind: ObjectKind, counter: Counter) -> Option<Self> {
        match (kind, counter) {
            (
                ObjectKind::Question | ObjectKind::Answer | ObjectKind::Comment,
                Counter::Votes | Counter::UpVotes | Counter::DownVotes,
            ) => Some(Target::ContentVotes),
            (ObjectKind::Question | ObjectKind::Tag, Counter::Follows) => Some(Target::ContentFollows),
            (ObjectKind::User, Counter::Follows) => Some(Target::UserFollows),
            _ => None,
        }
    }
}

/// Add `delta` to a counter of an object
///
/// Fails with [`Error::ObjectNotFound`] when the record is absent, which rolls
/// back the surrounding transaction.
pub fn increment(
    tx: &mut Transaction<'_>,
    kind: ObjectKind,
    object_id: &ObjectId,
    counter: Counter,
    delta: i64,
) -> Result<()> {
    let target = Target::of(kind, counter)
        .ok_or_else(|| Error::InvalidRequest(format!("{} has no {}", kind, counter)))?;

    match target {
        Target::ContentVotes | Target::ContentFollows => {
            let mut record = content::require_content(tx, object_id)?;
            match counter {
                Counter::Votes => record.vote_count += delta,
                Counter::UpVotes => record.up_votes += delta,
                Counter::DownVotes => record.down_votes += delta,
                Counter::Follows => record.follow_count += delta,
            }
            content::put_content(tx, &record)?;
        }
        Target::UserFollows => {
            let mut user = content::get_user(tx, &UserId::new(object_id.as_str()))?
                .ok_or_else(|| Error::ObjectNotFound(object_id.to_string()))?;
            user.follow_count += delta;
            content::put_user(tx, &user)?;
        }
    }

    tracing::debug!(object_id = %object_id, %counter, delta, "Counter updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::types::{ContentRecord, UserRecord};
    use crate::Config;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_dispatch_by_kind() {
        let (storage, _temp) = test_storage();
        let tag = ObjectId::encode(ObjectKind::Tag, 1);
        let user = ObjectId::encode(ObjectKind::User, 1);

        let mut tx = storage.begin();
        content::put_content(&mut tx, &ContentRecord::new(tag.clone(), ObjectKind::Tag, None)).unwrap();
        content::put_user(&mut tx, &UserRecord::new(UserId::new(user.as_str()))).unwrap();

        increment(&mut tx, ObjectKind::Tag, &tag, Counter::Follows, 1).unwrap();
        increment(&mut tx, ObjectKind::User, &user, Counter::Follows, 2).unwrap();
        tx.commit().unwrap();

        assert_eq!(content::require_content(&storage, &tag).unwrap().follow_count, 1);
        assert_eq!(
            content::require_user(&storage, &UserId::new(user.as_str())).unwrap().follow_count,
            2
        );
    }

    #[test]
    fn test_vote_counters_are_separate() {
        let (storage, _temp) = test_storage();
        let answer = ObjectId::encode(ObjectKind::Answer, 1);

        let mut tx = storage.begin();
        content::put_content(&mut tx, &ContentRecord::new(answer.clone(), ObjectKind::Answer, None)).unwrap();
        increment(&mut tx, ObjectKind::Answer, &answer, Counter::UpVotes, 2).unwrap();
        increment(&mut tx, ObjectKind::Answer, &answer, Counter::DownVotes, 1).unwrap();
        increment(&mut tx, ObjectKind::Answer, &answer, Counter::Votes, 1).unwrap();
        tx.commit().unwrap();

        let record = content::require_content(&storage, &answer).unwrap();
        assert_eq!((record.up_votes, record.down_votes, record.vote_count), (2, 1, 1));
        assert_eq!(record.follow_count, 0);
    }

    #[test]
    fn test_unsupported_counter() {
        let (storage, _temp) = test_storage();
        let mut tx = storage.begin();

        let err = increment(&mut tx, ObjectKind::Tag, &ObjectId::new("t"), Counter::Votes, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let (storage, _temp) = test_storage();
        let mut tx = storage.begin();

        let err = increment(&mut tx, ObjectKind::Answer, &ObjectId::new("a"), Counter::Votes, 1).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound(_)));
    }
}
