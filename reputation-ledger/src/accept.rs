//! Accept-answer orchestrator
//!
//! Accepting an answer activates a pair of rows in one transaction, both
//! targeting the answer:
//!
//! - `answer.accept` for the asker, anchored to the question
//! - `answer.accepted` for the answerer, anchored to the answer
//!
//! Switching the accepted answer is two transactions: cancel the old pair,
//! then accept the new one. A failure between them leaves the old acceptance
//! reversed and the new one unapplied.

use crate::{
    content,
    ledger::ReputationLedger,
    types::{Action, ActivityKey, ActivityType, ObjectId, ObjectKind, UserId},
    Error, Result,
};
use notice_bus::NotificationMsg;

/// Inbox action sent to the answerer
pub const ACCEPT_ANSWER_ACTION: &str = "accept_answer";

/// Parties of an accept or cancel-accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptRequest {
    /// Accepted answer
    pub answer_id: ObjectId,
    /// Question the answer belongs to
    pub question_id: ObjectId,
    /// Question owner performing the accept
    pub asker_id: UserId,
    /// Answer owner
    pub answerer_id: UserId,
    /// Self-accept: rows are recorded but carry no rank
    pub is_self: bool,
}

impl AcceptRequest {
    /// Build a request; `is_self` is derived from the two users
    pub fn new(answer_id: ObjectId, question_id: ObjectId, asker_id: UserId, answerer_id: UserId) -> Self {
        let is_self = asker_id == answerer_id;
        Self {
            answer_id,
            question_id,
            asker_id,
            answerer_id,
            is_self,
        }
    }

    fn accept_key(&self, activity_type: ActivityType) -> ActivityKey {
        ActivityKey::new(self.answer_id.clone(), self.asker_id.clone(), &self.asker_id, activity_type)
    }

    fn accepted_key(&self, activity_type: ActivityType) -> ActivityKey {
        ActivityKey::new(self.answer_id.clone(), self.answerer_id.clone(), &self.asker_id, activity_type)
    }
}

impl ReputationLedger {
    /// Accept an answer
    pub async fn accept_answer(&self, request: &AcceptRequest) -> Result<()> {
        self.validate_accept(request)?;
        let notices = self.apply_accept(request)?;
        self.dispatch(notices).await;
        Ok(())
    }

    /// Withdraw an acceptance
    pub async fn cancel_accept_answer(&self, request: &AcceptRequest) -> Result<()> {
        self.validate_accept(request)?;
        let notices = self.revert_accept(request)?;
        self.dispatch(notices).await;
        Ok(())
    }

    /// Move the acceptance from one answer of a question to another
    pub async fn switch_accepted_answer(&self, old: &AcceptRequest, new: &AcceptRequest) -> Result<()> {
        if old.question_id != new.question_id {
            return Err(Error::InvalidRequest(format!(
                "answers {} and {} belong to different questions",
                old.answer_id, new.answer_id
            )));
        }

        if old.answer_id != new.answer_id {
            self.cancel_accept_answer(old).await?;
        }
        self.accept_answer(new).await
    }

    fn validate_accept(&self, request: &AcceptRequest) -> Result<()> {
        let answer = content::require_content(self.storage(), &request.answer_id)?;
        let question = content::require_content(self.storage(), &request.question_id)?;

        if answer.kind != ObjectKind::Answer || question.kind != ObjectKind::Question {
            return Err(Error::InvalidRequest(format!(
                "{} is not an answer of question {}",
                request.answer_id, request.question_id
            )));
        }
        if answer.parent_id.as_ref() != Some(&request.question_id) {
            return Err(Error::InvalidRequest(format!(
                "answer {} does not belong to question {}",
                request.answer_id, request.question_id
            )));
        }
        if question.owner_id.as_ref() != Some(&request.asker_id) {
            return Err(Error::InvalidRequest(format!(
                "user {} does not own question {}",
                request.asker_id, request.question_id
            )));
        }

        Ok(())
    }

    fn apply_accept(&self, request: &AcceptRequest) -> Result<Vec<NotificationMsg>> {
        let accept = self.resolver.resolve(ObjectKind::Answer, Action::Accept)?;
        let accepted = self.resolver.resolve(ObjectKind::Answer, Action::Accepted)?;
        let rank_of = |configured: i64| if request.is_self { 0 } else { configured };

        let mut tx = self.storage.begin();
        let mut notices = Vec::new();

        let asker_side = self.activate_slot(
            &mut tx,
            request.accept_key(accept.activity_type),
            &request.question_id,
            rank_of(accept.rank),
            accept.has_rank,
        )?;
        let answerer_side = self.activate_slot(
            &mut tx,
            request.accepted_key(accepted.activity_type),
            &request.answer_id,
            rank_of(accepted.rank),
            accepted.has_rank,
        )?;

        let changed = asker_side.is_some() || answerer_side.is_some();
        for (row, outcome) in asker_side.iter().chain(answerer_side.iter()) {
            notices.extend(Self::achievement(row, ObjectKind::Answer, outcome.applied));
        }

        let mut question = content::require_content(&tx, &request.question_id)?;
        question.accepted_answer_id = Some(request.answer_id.clone());
        content::put_content(&mut tx, &question)?;
        tx.commit()?;

        if changed && request.answerer_id != request.asker_id {
            notices.push(
                NotificationMsg::inbox(
                    request.answerer_id.as_str(),
                    request.answer_id.as_str(),
                    ObjectKind::Answer.as_str(),
                )
                .with_trigger(request.asker_id.as_str())
                .with_action(ACCEPT_ANSWER_ACTION),
            );
        }

        tracing::info!(
            answer_id = %request.answer_id,
            question_id = %request.question_id,
            asker_id = %request.asker_id,
            answerer_id = %request.answerer_id,
            is_self = request.is_self,
            "Answer accepted"
        );

        Ok(notices)
    }

    fn revert_accept(&self, request: &AcceptRequest) -> Result<Vec<NotificationMsg>> {
        let accept = self.resolver.code_of_key(&Action::Accept.key(ObjectKind::Answer))?;
        let accepted = self.resolver.code_of_key(&Action::Accepted.key(ObjectKind::Answer))?;

        let mut tx = self.storage.begin();
        let mut notices = Vec::new();

        let asker_side = self.deactivate_slot(&mut tx, &request.accept_key(accept))?;
        let answerer_side = self.deactivate_slot(&mut tx, &request.accepted_key(accepted))?;

        for (row, outcome) in asker_side.iter().chain(answerer_side.iter()) {
            notices.extend(Self::achievement(row, ObjectKind::Answer, outcome.applied));
        }

        let mut question = content::require_content(&tx, &request.question_id)?;
        if question.accepted_answer_id.as_ref() == Some(&request.answer_id) {
            question.accepted_answer_id = None;
            content::put_content(&mut tx, &question)?;
        }
        tx.commit()?;

        tracing::info!(
            answer_id = %request.answer_id,
            question_id = %request.question_id,
            "Answer acceptance cancelled"
        );

        Ok(notices)
    }
}
