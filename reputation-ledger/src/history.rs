//! Ledger queries
//!
//! Read-only views over committed rows: a user's reputation history, the
//! votes they cast, the timeline of a piece of content and ledger replay.

use crate::{
    activity, content,
    ledger::ReputationLedger,
    types::{Activity, ObjectId, Page, UserId},
    Result,
};

impl ReputationLedger {
    /// Current rank of a user
    pub fn user_rank(&self, user_id: &UserId) -> Result<i64> {
        Ok(content::require_user(self.storage(), user_id)?.rank)
    }

    /// Sum of a user's active recorded ranks
    ///
    /// Matches `user_rank` minus the starting rank for any history that
    /// never touched the floor.
    pub fn earned_rank(&self, user_id: &UserId) -> Result<i64> {
        Ok(activity::for_user(self.storage(), user_id)?
            .iter()
            .filter(|row| row.is_active())
            .map(|row| row.rank)
            .sum())
    }

    /// Active rank-bearing rows of a user, newest first
    pub fn rank_history(&self, user_id: &UserId, page: usize, page_size: usize) -> Result<Page<Activity>> {
        let mut rows: Vec<Activity> = activity::for_user(self.storage(), user_id)?
            .into_iter()
            .filter(|row| row.is_active() && row.has_rank)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(Page::slice(rows, page, page_size))
    }

    /// Active votes cast by a user, most recently updated first
    pub fn user_votes(&self, user_id: &UserId, page: usize, page_size: usize) -> Result<Page<Activity>> {
        let vote_types = self.resolver.vote_types();
        let mut rows: Vec<Activity> = activity::for_user(self.storage(), user_id)?
            .into_iter()
            .filter(|row| row.is_active() && vote_types.contains(&row.activity_type))
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok(Page::slice(rows, page, page_size))
    }

    /// Every row anchored to a piece of content, newest first
    ///
    /// Vote rows are left out unless `show_votes` is set.
    pub fn object_timeline(&self, original_object_id: &ObjectId, show_votes: bool) -> Result<Vec<Activity>> {
        let vote_types = self.resolver.all_vote_types();
        let mut rows: Vec<Activity> = activity::for_origin(self.storage(), original_object_id)?
            .into_iter()
            .filter(|row| show_votes || !vote_types.contains(&row.activity_type))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows)
    }

    /// Active votes across the whole ledger
    pub fn total_votes(&self) -> Result<u64> {
        let vote_types = self.resolver.vote_types();
        Ok(activity::all(self.storage())?
            .iter()
            .filter(|row| row.is_active() && vote_types.contains(&row.activity_type))
            .count() as u64)
    }
}
