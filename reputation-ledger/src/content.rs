//! User and content records
//!
//! Minimal state the ledger mutates besides its own rows: `User.rank` (owned
//! by the rank engine), follower counts, and the content counters.

use crate::error::{Error, Result};
use crate::storage::{compose_key, last_part, prefix_key, Cf, ReadView};
use crate::transaction::Transaction;
use crate::types::{ContentRecord, ObjectId, UserId, UserRecord};

/// Load a user
pub fn get_user(view: &impl ReadView, user_id: &UserId) -> Result<Option<UserRecord>> {
    view.get_record(Cf::Users, user_id.as_str().as_bytes())
}

/// Load a user, failing when absent
pub fn require_user(view: &impl ReadView, user_id: &UserId) -> Result<UserRecord> {
    get_user(view, user_id)?.ok_or_else(|| Error::UserNotFound(user_id.to_string()))
}

/// Stage a user write
pub fn put_user(tx: &mut Transaction<'_>, user: &UserRecord) -> Result<()> {
    tx.put_record(Cf::Users, user.id.as_str().as_bytes().to_vec(), user)
}

/// Load a content record
pub fn get_content(view: &impl ReadView, object_id: &ObjectId) -> Result<Option<ContentRecord>> {
    view.get_record(Cf::Content, object_id.as_str().as_bytes())
}

/// Load a content record, failing when absent
pub fn require_content(view: &impl ReadView, object_id: &ObjectId) -> Result<ContentRecord> {
    get_content(view, object_id)?.ok_or_else(|| Error::ObjectNotFound(object_id.to_string()))
}

/// Stage a content write
pub fn put_content(tx: &mut Transaction<'_>, content: &ContentRecord) -> Result<()> {
    tx.put_record(Cf::Content, content.id.as_str().as_bytes().to_vec(), content)
}

/// Record `child` under `parent`
pub fn link_child(tx: &mut Transaction<'_>, parent: &ObjectId, child: &ObjectId) {
    tx.put(
        Cf::ContentChildren,
        compose_key(&[parent.as_str().as_bytes(), child.as_str().as_bytes()]),
        Vec::new(),
    );
}

/// Children of a content record, in ID order
pub fn children(view: &impl ReadView, parent: &ObjectId) -> Result<Vec<ObjectId>> {
    let prefix = prefix_key(&[parent.as_str().as_bytes()]);

    view.scan_prefix(Cf::ContentChildren, &prefix)?
        .into_iter()
        .map(|(key, _)| {
            String::from_utf8(last_part(&key)?.to_vec())
                .map(ObjectId::new)
                .map_err(|e| Error::Storage(format!("corrupt child key: {}", e)))
        })
        .collect()
}
