use course_core::model::{CourseId, LectureId};

use super::{
    SqliteRepository,
    mapping::{id_to_i64, map_progress_row},
};
use crate::repository::{ProgressCacheRecord, ProgressCacheRepository, StorageError};

#[async_trait::async_trait]
impl ProgressCacheRepository for SqliteRepository {
    async fn put(&self, record: &ProgressCacheRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO progress_cache (
                course_id, lecture_id, progress_percent, last_timestamp_seconds,
                duration_seconds, completed, last_updated
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(course_id, lecture_id) DO UPDATE SET
                progress_percent = excluded.progress_percent,
                last_timestamp_seconds = excluded.last_timestamp_seconds,
                duration_seconds = excluded.duration_seconds,
                completed = excluded.completed,
                last_updated = excluded.last_updated
            ",
        )
        .bind(id_to_i64(record.course_id.value(), "course_id")?)
        .bind(id_to_i64(record.lecture_id.value(), "lecture_id")?)
        .bind(record.progress_percent)
        .bind(record.last_timestamp_seconds)
        .bind(record.duration_seconds)
        .bind(record.completed)
        .bind(record.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<Option<ProgressCacheRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT course_id, lecture_id, progress_percent, last_timestamp_seconds,
                   duration_seconds, completed, last_updated
            FROM progress_cache
            WHERE course_id = ?1 AND lecture_id = ?2
            ",
        )
        .bind(id_to_i64(course_id.value(), "course_id")?)
        .bind(id_to_i64(lecture_id.value(), "lecture_id")?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn delete(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM progress_cache WHERE course_id = ?1 AND lecture_id = ?2")
            .bind(id_to_i64(course_id.value(), "course_id")?)
            .bind(id_to_i64(lecture_id.value(), "lecture_id")?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn delete_many(
        &self,
        course_id: CourseId,
        lecture_ids: &[LectureId],
    ) -> Result<(), StorageError> {
        if lecture_ids.is_empty() {
            return Ok(());
        }

        let mut sql =
            String::from("DELETE FROM progress_cache WHERE course_id = ?1 AND lecture_id IN (");
        for i in 0..lecture_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql).bind(id_to_i64(course_id.value(), "course_id")?);
        for lecture_id in lecture_ids {
            q = q.bind(id_to_i64(lecture_id.value(), "lecture_id")?);
        }

        q.execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn list_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<ProgressCacheRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT course_id, lecture_id, progress_percent, last_timestamp_seconds,
                   duration_seconds, completed, last_updated
            FROM progress_cache
            WHERE course_id = ?1
            ORDER BY lecture_id ASC
            ",
        )
        .bind(id_to_i64(course_id.value(), "course_id")?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(map_progress_row(row)?);
        }
        Ok(records)
    }
}
