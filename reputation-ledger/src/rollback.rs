//! Cascading rollback
//!
//! Deleting content reverses every active rank-bearing row targeting it.
//! A question is rolled back in its own transaction, then each of its answers
//! in a separate one; a failing answer is logged and skipped.

use crate::{activity, content, ledger::ReputationLedger, types::ObjectId, Result};

impl ReputationLedger {
    /// Reverse the rank effects tied to an answer
    ///
    /// Returns the number of rows reversed; zero when the answer is unknown
    /// or already rolled back.
    pub fn delete_answer(&self, answer_id: &ObjectId) -> Result<usize> {
        if content::get_content(self.storage(), answer_id)?.is_none() {
            tracing::debug!(answer_id = %answer_id, "Nothing to roll back for unknown answer");
            return Ok(0);
        }

        self.rollback_object(answer_id)
    }

    /// Reverse the rank effects tied to a question and all of its answers
    pub fn delete_question(&self, question_id: &ObjectId) -> Result<usize> {
        if content::get_content(self.storage(), question_id)?.is_none() {
            tracing::debug!(question_id = %question_id, "Nothing to roll back for unknown question");
            return Ok(0);
        }

        let mut reversed = self.rollback_object(question_id)?;

        for answer_id in content::children(self.storage(), question_id)? {
            match self.delete_answer(&answer_id) {
                Ok(rows) => reversed += rows,
                Err(e) => tracing::error!(
                    question_id = %question_id,
                    answer_id = %answer_id,
                    error = %e,
                    "Answer rollback failed"
                ),
            }
        }

        tracing::info!(question_id = %question_id, reversed, "Question rolled back");
        Ok(reversed)
    }

    fn rollback_object(&self, object_id: &ObjectId) -> Result<usize> {
        let mut tx = self.storage.begin();

        let rows = activity::ranked_active_for_object(&tx, object_id)?;
        let count = rows.len();
        for row in rows {
            self.cancel_row(&mut tx, row)?;
        }
        tx.commit()?;

        if count > 0 {
            self.metrics.record_rollback(count);
            tracing::info!(object_id = %object_id, rows = count, "Rank rolled back");
        }

        Ok(count)
    }
}
