use course_core::model::AttemptId;

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_draft_row},
};
use crate::repository::{AttemptDraftRecord, AttemptDraftRepository, StorageError};

#[async_trait::async_trait]
impl AttemptDraftRepository for SqliteRepository {
    async fn put(&self, draft: &AttemptDraftRecord) -> Result<(), StorageError> {
        let answers = serde_json::to_string(&draft.answers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let flagged = serde_json::to_string(&draft.flagged)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let seconds = serde_json::to_string(&draft.seconds_per_question)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO attempt_drafts (
                attempt_id, quiz_id, answers, flagged, seconds_per_question,
                current_question_index, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(attempt_id) DO UPDATE SET
                answers = excluded.answers,
                flagged = excluded.flagged,
                seconds_per_question = excluded.seconds_per_question,
                current_question_index = excluded.current_question_index,
                updated_at = excluded.updated_at
            ",
        )
        .bind(id_to_i64(draft.attempt_id.value(), "attempt_id")?)
        .bind(id_to_i64(draft.quiz_id.value(), "quiz_id")?)
        .bind(answers)
        .bind(flagged)
        .bind(seconds)
        .bind(i64::from(draft.current_question_index))
        .bind(draft.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, attempt_id: AttemptId) -> Result<Option<AttemptDraftRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT attempt_id, quiz_id, answers, flagged, seconds_per_question,
                   current_question_index, updated_at
            FROM attempt_drafts
            WHERE attempt_id = ?1
            ",
        )
        .bind(id_to_i64(attempt_id.value(), "attempt_id")?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_draft_row).transpose()
    }

    async fn delete(&self, attempt_id: AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_drafts WHERE attempt_id = ?1")
            .bind(id_to_i64(attempt_id.value(), "attempt_id")?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
