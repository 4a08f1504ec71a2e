use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the write-ahead progress cache and the attempt-draft buffer.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress_cache (
                    course_id INTEGER NOT NULL,
                    lecture_id INTEGER NOT NULL,
                    progress_percent REAL NOT NULL
                        CHECK (progress_percent BETWEEN 0 AND 100),
                    last_timestamp_seconds REAL NOT NULL CHECK (last_timestamp_seconds >= 0),
                    duration_seconds REAL NOT NULL CHECK (duration_seconds >= 0),
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    last_updated TEXT NOT NULL,
                    PRIMARY KEY (course_id, lecture_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempt_drafts (
                    attempt_id INTEGER PRIMARY KEY,
                    quiz_id INTEGER NOT NULL,
                    answers TEXT NOT NULL,
                    flagged TEXT NOT NULL,
                    seconds_per_question TEXT NOT NULL,
                    current_question_index INTEGER NOT NULL
                        CHECK (current_question_index >= 0),
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_progress_cache_course
                    ON progress_cache (course_id, lecture_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempt_drafts_quiz
                    ON attempt_drafts (quiz_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
