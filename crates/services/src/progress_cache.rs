//! Write-ahead cache for per-lecture playback progress.
//!
//! Every playback tick lands here first; the reconciler drains the cache
//! toward the server later. Entries survive reloads, so progress watched
//! offline is never lost, only deferred.

use std::sync::Arc;

use tracing::debug;

use course_core::model::{CourseId, LectureId, LectureProgressRecord};
use course_core::time::Clock;
use storage::repository::{ProgressCacheRecord, ProgressCacheRepository};

use crate::error::ProgressError;

pub struct ProgressCache {
    repo: Arc<dyn ProgressCacheRepository>,
    clock: Clock,
}

impl ProgressCache {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressCacheRepository>, clock: Clock) -> Self {
        Self { repo, clock }
    }

    /// Record one playback observation, monotonically.
    ///
    /// The new observation is folded into the cached entry: percent never
    /// decreases and completion never downgrades, so a seek back to the start
    /// of a finished lecture cannot undo its completed state.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the cache cannot be read or
    /// written.
    pub async fn record(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
        current_time_seconds: f64,
        duration_seconds: f64,
        completed_override: bool,
    ) -> Result<LectureProgressRecord, ProgressError> {
        let observed = LectureProgressRecord::from_playback(
            lecture_id,
            current_time_seconds,
            duration_seconds,
            completed_override,
            self.clock.now(),
        );

        let merged = match self.repo.get(course_id, lecture_id).await? {
            Some(cached) => {
                let mut record = cached.into_record();
                record.absorb(&observed);
                record
            }
            None => observed,
        };

        self.repo
            .put(&ProgressCacheRecord::from_record(course_id, &merged))
            .await?;
        Ok(merged)
    }

    /// Last cached record for a lecture, or nothing.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on cache failures.
    pub async fn get(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<Option<LectureProgressRecord>, ProgressError> {
        Ok(self
            .repo
            .get(course_id, lecture_id)
            .await?
            .map(ProgressCacheRecord::into_record))
    }

    /// All cached records for a course, ordered by lecture.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on cache failures.
    pub async fn list(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<LectureProgressRecord>, ProgressError> {
        Ok(self
            .repo
            .list_for_course(course_id)
            .await?
            .into_iter()
            .map(ProgressCacheRecord::into_record)
            .collect())
    }

    /// Drop one lecture's cached entry after the server has acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on cache failures.
    pub async fn clear_lecture(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<(), ProgressError> {
        debug!(course = %course_id, lecture = %lecture_id, "clearing acknowledged cache entry");
        self.repo.delete(course_id, lecture_id).await?;
        Ok(())
    }

    /// Drop every cached entry for a course (progress reset).
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on cache failures.
    pub async fn clear_course(&self, course_id: CourseId) -> Result<(), ProgressError> {
        let keys: Vec<LectureId> = self
            .repo
            .list_for_course(course_id)
            .await?
            .into_iter()
            .map(|r| r.lecture_id)
            .collect();
        debug!(course = %course_id, entries = keys.len(), "resetting cached course progress");
        self.repo.delete_many(course_id, &keys).await?;
        Ok(())
    }
}
