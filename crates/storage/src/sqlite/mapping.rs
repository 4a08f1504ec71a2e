use chrono::{DateTime, Utc};
use course_core::model::{AttemptId, CourseId, LectureId, QuizId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{AttemptDraftRecord, ProgressCacheRecord, StorageError};

pub(super) fn id_to_i64(value: u64, what: &'static str) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::Serialization(format!("{what} overflow")))
}

fn id_from_i64(value: i64, what: &'static str) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| StorageError::Serialization(format!("negative {what}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(super) fn map_progress_row(row: &SqliteRow) -> Result<ProgressCacheRecord, StorageError> {
    let course_id: i64 = column(row, "course_id")?;
    let lecture_id: i64 = column(row, "lecture_id")?;
    let last_updated: DateTime<Utc> = column(row, "last_updated")?;
    Ok(ProgressCacheRecord {
        course_id: CourseId::new(id_from_i64(course_id, "course_id")?),
        lecture_id: LectureId::new(id_from_i64(lecture_id, "lecture_id")?),
        progress_percent: column(row, "progress_percent")?,
        last_timestamp_seconds: column(row, "last_timestamp_seconds")?,
        duration_seconds: column(row, "duration_seconds")?,
        completed: column(row, "completed")?,
        last_updated,
    })
}

pub(super) fn map_draft_row(row: &SqliteRow) -> Result<AttemptDraftRecord, StorageError> {
    let attempt_id: i64 = column(row, "attempt_id")?;
    let quiz_id: i64 = column(row, "quiz_id")?;
    let answers_json: String = column(row, "answers")?;
    let flagged_json: String = column(row, "flagged")?;
    let seconds_json: String = column(row, "seconds_per_question")?;
    let current_question_index: i64 = column(row, "current_question_index")?;
    let updated_at: DateTime<Utc> = column(row, "updated_at")?;

    Ok(AttemptDraftRecord {
        attempt_id: AttemptId::new(id_from_i64(attempt_id, "attempt_id")?),
        quiz_id: QuizId::new(id_from_i64(quiz_id, "quiz_id")?),
        answers: serde_json::from_str(&answers_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        flagged: serde_json::from_str(&flagged_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        seconds_per_question: serde_json::from_str(&seconds_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        current_question_index: u32::try_from(current_question_index)
            .map_err(|_| StorageError::Serialization("negative question index".into()))?,
        updated_at,
    })
}
