//! Ledger store
//!
//! Rows live in `activities` keyed by their ID. Every row also occupies
//! exactly one slot in `activity_slots` for its `(object, user, trigger,
//! type)` tuple and is listed in the per-object, per-user and per-origin
//! indices. Rows are never deleted; cancellation flips their state.
//!
//! `activity_by_user_day` files each row under the UTC day of its last
//! update and moves it whenever the row is cancelled or reactivated, so the
//! daily cap only reads the days it covers.
//!
//! All writes go through a [`Transaction`]; reads accept any [`ReadView`] so
//! they observe staged writes when called inside a transaction.

use crate::error::{Error, Result};
use crate::storage::{compose_key, last_part, prefix_key, Cf, ReadView};
use crate::transaction::Transaction;
use crate::types::{Activity, ActivityId, ActivityKey, ActivityState, ActivityType, ObjectId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

fn row_key(id: &ActivityId) -> Vec<u8> {
    id.0.as_bytes().to_vec()
}

fn slot_key(key: &ActivityKey) -> Vec<u8> {
    let trigger = key
        .trigger_user_id
        .as_ref()
        .map(|u| u.as_str().as_bytes())
        .unwrap_or_default();

    compose_key(&[
        key.object_id.as_str().as_bytes(),
        key.user_id.as_str().as_bytes(),
        trigger,
        &key.activity_type.0.to_be_bytes(),
    ])
}

fn index_key(owner: &str, id: &ActivityId) -> Vec<u8> {
    compose_key(&[owner.as_bytes(), id.0.as_bytes()])
}

fn day_part(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

fn day_key(activity: &Activity) -> Vec<u8> {
    let day = day_part(activity.updated_at.date_naive());
    compose_key(&[
        activity.user_id.as_str().as_bytes(),
        day.as_bytes(),
        activity.id.0.as_bytes(),
    ])
}

fn decode_id(bytes: &[u8]) -> Result<ActivityId> {
    Uuid::from_slice(bytes)
        .map(ActivityId)
        .map_err(|e| Error::Storage(format!("corrupt activity id: {}", e)))
}

/// Load one row by ID
pub fn get(view: &impl ReadView, id: &ActivityId) -> Result<Option<Activity>> {
    view.get_record(Cf::Activities, &row_key(id))
}

/// Row occupying a slot, active or not
pub fn find_by_key(view: &impl ReadView, key: &ActivityKey) -> Result<Option<Activity>> {
    let Some(id) = view.get(Cf::ActivitySlots, &slot_key(key))? else {
        return Ok(None);
    };

    let id = decode_id(&id)?;
    get(view, &id)?
        .map(Some)
        .ok_or_else(|| Error::InvariantViolation(format!("slot points at missing row {}", id)))
}

/// Insert a new row into a free slot
pub fn insert(tx: &mut Transaction<'_>, activity: &Activity) -> Result<()> {
    let slot = slot_key(&activity.key());
    if tx.get(Cf::ActivitySlots, &slot)?.is_some() {
        return Err(Error::InvariantViolation(format!(
            "slot already taken: object={} user={} type={}",
            activity.object_id, activity.user_id, activity.activity_type
        )));
    }

    let id = row_key(&activity.id);
    tx.put_record(Cf::Activities, id.clone(), activity)?;
    tx.put(Cf::ActivitySlots, slot, id);
    tx.put(
        Cf::ActivityByObject,
        index_key(activity.object_id.as_str(), &activity.id),
        Vec::new(),
    );
    tx.put(
        Cf::ActivityByUser,
        index_key(activity.user_id.as_str(), &activity.id),
        Vec::new(),
    );
    tx.put(
        Cf::ActivityByOrigin,
        index_key(activity.original_object_id.as_str(), &activity.id),
        Vec::new(),
    );
    tx.put(Cf::ActivityByUserDay, day_key(activity), Vec::new());

    tracing::debug!(
        activity_id = %activity.id,
        object_id = %activity.object_id,
        user_id = %activity.user_id,
        activity_type = %activity.activity_type,
        rank = activity.rank,
        "Activity inserted"
    );

    Ok(())
}

/// Bring a cancelled row back with a freshly applied rank
pub fn reactivate(tx: &mut Transaction<'_>, mut activity: Activity, rank: i64) -> Result<Activity> {
    tx.delete(Cf::ActivityByUserDay, day_key(&activity));
    activity.state = ActivityState::Active;
    activity.rank = rank;
    activity.updated_at = Utc::now();
    tx.put_record(Cf::Activities, row_key(&activity.id), &activity)?;
    tx.put(Cf::ActivityByUserDay, day_key(&activity), Vec::new());

    tracing::debug!(activity_id = %activity.id, rank, "Activity reactivated");
    Ok(activity)
}

/// Mark a row cancelled
pub fn cancel(tx: &mut Transaction<'_>, mut activity: Activity) -> Result<Activity> {
    tx.delete(Cf::ActivityByUserDay, day_key(&activity));
    let now = Utc::now();
    activity.state = ActivityState::Cancelled;
    activity.cancelled_at = Some(now);
    activity.updated_at = now;
    tx.put_record(Cf::Activities, row_key(&activity.id), &activity)?;
    tx.put(Cf::ActivityByUserDay, day_key(&activity), Vec::new());

    tracing::debug!(activity_id = %activity.id, "Activity cancelled");
    Ok(activity)
}

fn load_prefix(view: &impl ReadView, cf: Cf, prefix: &[u8]) -> Result<Vec<Activity>> {
    let mut rows = Vec::new();

    for (key, _) in view.scan_prefix(cf, prefix)? {
        let id = decode_id(last_part(&key)?)?;
        let row = get(view, &id)?
            .ok_or_else(|| Error::InvariantViolation(format!("index points at missing row {}", id)))?;
        rows.push(row);
    }

    Ok(rows)
}

fn load_indexed(view: &impl ReadView, cf: Cf, owner: &str) -> Result<Vec<Activity>> {
    load_prefix(view, cf, &prefix_key(&[owner.as_bytes()]))
}

/// Every row targeting an object
pub fn for_object(view: &impl ReadView, object_id: &ObjectId) -> Result<Vec<Activity>> {
    load_indexed(view, Cf::ActivityByObject, object_id.as_str())
}

/// Every row affecting a user
pub fn for_user(view: &impl ReadView, user_id: &UserId) -> Result<Vec<Activity>> {
    load_indexed(view, Cf::ActivityByUser, user_id.as_str())
}

/// Every row anchored to a context object
pub fn for_origin(view: &impl ReadView, original_object_id: &ObjectId) -> Result<Vec<Activity>> {
    load_indexed(view, Cf::ActivityByOrigin, original_object_id.as_str())
}

/// Every row in the ledger
pub fn all(view: &impl ReadView) -> Result<Vec<Activity>> {
    view.scan_prefix(Cf::Activities, &[])?
        .into_iter()
        .map(|(_, value)| bincode::deserialize(&value).map_err(Error::from))
        .collect()
}

/// Active rank-bearing rows targeting an object
pub fn ranked_active_for_object(view: &impl ReadView, object_id: &ObjectId) -> Result<Vec<Activity>> {
    Ok(for_object(view, object_id)?
        .into_iter()
        .filter(|row| row.has_rank && row.is_active())
        .collect())
}

/// Sum of recorded rank over a user's active rows updated within `[start, end]`
pub fn sum_rank_between(
    view: &impl ReadView,
    user_id: &UserId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64> {
    let mut sum = 0;
    let mut day = start.date_naive();
    let last = end.date_naive();

    while day <= last {
        let part = day_part(day);
        let prefix = prefix_key(&[user_id.as_str().as_bytes(), part.as_bytes()]);
        sum += load_prefix(view, Cf::ActivityByUserDay, &prefix)?
            .iter()
            .filter(|row| row.is_active() && row.updated_at >= start && row.updated_at <= end)
            .map(|row| row.rank)
            .sum::<i64>();

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    Ok(sum)
}

/// Active rows of the given types targeting an object
pub fn count_active(view: &impl ReadView, object_id: &ObjectId, types: &[ActivityType]) -> Result<u64> {
    Ok(for_object(view, object_id)?
        .iter()
        .filter(|row| row.is_active() && types.contains(&row.activity_type))
        .count() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::Config;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn vote_key(object: &str, user: &str, actor: &str) -> ActivityKey {
        ActivityKey::new(ObjectId::new(object), UserId::new(user), &UserId::new(actor), ActivityType(21))
    }

    #[test]
    fn test_insert_and_find_by_key() {
        let (storage, _temp) = test_storage();
        let key = vote_key("a1", "bob", "alice");
        let row = Activity::new(key.clone(), ObjectId::new("q1"), 10, true);

        let mut tx = storage.begin();
        insert(&mut tx, &row).unwrap();
        // Visible inside the transaction before commit
        assert_eq!(find_by_key(&tx, &key).unwrap(), Some(row.clone()));
        tx.commit().unwrap();

        assert_eq!(find_by_key(&storage, &key).unwrap(), Some(row.clone()));
        assert_eq!(for_object(&storage, &ObjectId::new("a1")).unwrap().len(), 1);
        assert_eq!(for_user(&storage, &UserId::new("bob")).unwrap().len(), 1);
        assert_eq!(for_origin(&storage, &ObjectId::new("q1")).unwrap().len(), 1);
        assert!(find_by_key(&storage, &vote_key("a1", "bob", "carol")).unwrap().is_none());
    }

    #[test]
    fn test_second_insert_into_slot_fails() {
        let (storage, _temp) = test_storage();
        let key = vote_key("a1", "bob", "alice");

        let mut tx = storage.begin();
        insert(&mut tx, &Activity::new(key.clone(), ObjectId::new("q1"), 10, true)).unwrap();
        let err = insert(&mut tx, &Activity::new(key, ObjectId::new("q1"), 10, true)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_cancel_then_reactivate_keeps_identity() {
        let (storage, _temp) = test_storage();
        let key = vote_key("a1", "bob", "alice");
        let row = Activity::new(key.clone(), ObjectId::new("q1"), 10, true);

        let mut tx = storage.begin();
        insert(&mut tx, &row).unwrap();
        let cancelled = cancel(&mut tx, row.clone()).unwrap();
        assert!(!cancelled.is_active());
        assert!(cancelled.cancelled_at.is_some());
        let back = reactivate(&mut tx, cancelled, 0).unwrap();
        tx.commit().unwrap();

        let stored = find_by_key(&storage, &key).unwrap().unwrap();
        assert_eq!(stored, back);
        assert_eq!(stored.id, row.id);
        assert_eq!(stored.created_at, row.created_at);
        assert_eq!(stored.rank, 0);
        assert_eq!(all(&storage).unwrap().len(), 1);
    }

    #[test]
    fn test_sum_rank_between_counts_active_rows_in_window() {
        let (storage, _temp) = test_storage();

        let mut tx = storage.begin();
        let first = Activity::new(vote_key("a1", "bob", "alice"), ObjectId::new("q1"), 10, true);
        let second = Activity::new(vote_key("a2", "bob", "alice"), ObjectId::new("q1"), 5, true);
        let mut old = Activity::new(vote_key("a3", "bob", "alice"), ObjectId::new("q1"), 7, true);
        old.updated_at = Utc::now() - Duration::days(2);
        insert(&mut tx, &first).unwrap();
        insert(&mut tx, &second).unwrap();
        insert(&mut tx, &old).unwrap();
        cancel(&mut tx, second).unwrap();
        tx.commit().unwrap();

        let now = Utc::now();
        let sum = sum_rank_between(&storage, &UserId::new("bob"), now - Duration::hours(1), now).unwrap();
        assert_eq!(sum, 10);
    }

    #[test]
    fn test_reactivated_row_moves_to_current_day() {
        let (storage, _temp) = test_storage();
        let bob = UserId::new("bob");

        let mut stale = Activity::new(vote_key("a1", "bob", "alice"), ObjectId::new("q1"), 7, true);
        stale.updated_at = Utc::now() - Duration::days(2);
        stale.state = ActivityState::Cancelled;

        let mut tx = storage.begin();
        insert(&mut tx, &stale).unwrap();
        tx.commit().unwrap();

        let now = Utc::now();
        let window = (now - Duration::hours(1), now + Duration::hours(1));
        assert_eq!(sum_rank_between(&storage, &bob, window.0, window.1).unwrap(), 0);

        let mut tx = storage.begin();
        reactivate(&mut tx, stale.clone(), 10).unwrap();
        tx.commit().unwrap();

        assert_eq!(sum_rank_between(&storage, &bob, window.0, window.1).unwrap(), 10);
        let old_day = stale.updated_at;
        assert_eq!(
            sum_rank_between(&storage, &bob, old_day - Duration::hours(1), old_day + Duration::hours(1)).unwrap(),
            0
        );
        assert_eq!(storage.scan_prefix(Cf::ActivityByUserDay, &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_ranked_active_for_object() {
        let (storage, _temp) = test_storage();

        let mut tx = storage.begin();
        let ranked = Activity::new(vote_key("a1", "bob", "alice"), ObjectId::new("q1"), 10, true);
        let unranked = Activity::new(vote_key("a1", "alice", "alice"), ObjectId::new("q1"), 0, false);
        insert(&mut tx, &ranked).unwrap();
        insert(&mut tx, &unranked).unwrap();
        tx.commit().unwrap();

        let rows = ranked_active_for_object(&storage, &ObjectId::new("a1")).unwrap();
        assert_eq!(rows, vec![ranked]);
        assert_eq!(
            count_active(&storage, &ObjectId::new("a1"), &[ActivityType(21)]).unwrap(),
            2
        );
    }
}
