use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    AnswerValue, AttemptId, CourseId, LectureId, LectureProgressRecord, QuestionId, QuizId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// One write-ahead cache entry: the last persisted progress tuple for a
/// (course, lecture) pair.
///
/// Mirrors the domain `LectureProgressRecord` plus the course key, so
/// repositories can serialize without leaking storage concerns into the
/// domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCacheRecord {
    pub course_id: CourseId,
    pub lecture_id: LectureId,
    pub progress_percent: f64,
    pub last_timestamp_seconds: f64,
    pub duration_seconds: f64,
    pub completed: bool,
    pub last_updated: DateTime<Utc>,
}

impl ProgressCacheRecord {
    #[must_use]
    pub fn from_record(course_id: CourseId, record: &LectureProgressRecord) -> Self {
        Self {
            course_id,
            lecture_id: record.lecture_id,
            progress_percent: record.progress_percent,
            last_timestamp_seconds: record.last_timestamp_seconds,
            duration_seconds: record.duration_seconds,
            completed: record.completed,
            last_updated: record.last_updated,
        }
    }

    #[must_use]
    pub fn into_record(self) -> LectureProgressRecord {
        LectureProgressRecord {
            lecture_id: self.lecture_id,
            progress_percent: self.progress_percent,
            last_timestamp_seconds: self.last_timestamp_seconds,
            duration_seconds: self.duration_seconds,
            completed: self.completed,
            last_updated: self.last_updated,
        }
    }
}

/// Buffered state for one in-progress attempt, used solely for reload
/// resilience. The server stays the attempt's system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptDraftRecord {
    pub attempt_id: AttemptId,
    pub quiz_id: QuizId,
    pub answers: BTreeMap<QuestionId, AnswerValue>,
    pub flagged: BTreeSet<QuestionId>,
    pub seconds_per_question: BTreeMap<QuestionId, u32>,
    pub current_question_index: u32,
    pub updated_at: DateTime<Utc>,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Durable local write-ahead log of per-lecture progress.
#[async_trait]
pub trait ProgressCacheRepository: Send + Sync {
    /// Persist or replace the entry for (course, lecture).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn put(&self, record: &ProgressCacheRecord) -> Result<(), StorageError>;

    /// Last persisted tuple for (course, lecture), or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing entry is `Ok(None)`.
    async fn get(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<Option<ProgressCacheRecord>, StorageError>;

    /// Remove one lecture's entry. Removing a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete(&self, course_id: CourseId, lecture_id: LectureId)
    -> Result<(), StorageError>;

    /// Remove exactly the given lectures' entries (post-merge clear).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_many(
        &self,
        course_id: CourseId,
        lecture_ids: &[LectureId],
    ) -> Result<(), StorageError>;

    /// All cached entries for a course (the prefix listing).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<ProgressCacheRecord>, StorageError>;
}

/// Buffered answers/flags/timings for in-progress attempts.
#[async_trait]
pub trait AttemptDraftRepository: Send + Sync {
    /// Persist or replace the draft for its attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be stored.
    async fn put(&self, draft: &AttemptDraftRecord) -> Result<(), StorageError>;

    /// The buffered draft for an attempt, or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing draft is `Ok(None)`.
    async fn get(&self, attempt_id: AttemptId) -> Result<Option<AttemptDraftRecord>, StorageError>;

    /// Drop the draft after submit/finalize. Missing drafts are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete(&self, attempt_id: AttemptId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

/// Simple in-memory repository for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(CourseId, LectureId), ProgressCacheRecord>>>,
    drafts: Arc<Mutex<HashMap<AttemptId, AttemptDraftRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressCacheRepository for InMemoryRepository {
    async fn put(&self, record: &ProgressCacheRecord) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((record.course_id, record.lecture_id), record.clone());
        Ok(())
    }

    async fn get(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<Option<ProgressCacheRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(course_id, lecture_id)).cloned())
    }

    async fn delete(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&(course_id, lecture_id));
        Ok(())
    }

    async fn delete_many(
        &self,
        course_id: CourseId,
        lecture_ids: &[LectureId],
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for lecture_id in lecture_ids {
            guard.remove(&(course_id, *lecture_id));
        }
        Ok(())
    }

    async fn list_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<ProgressCacheRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.course_id == course_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.lecture_id);
        Ok(records)
    }
}

#[async_trait]
impl AttemptDraftRepository for InMemoryRepository {
    async fn put(&self, draft: &AttemptDraftRecord) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(draft.attempt_id, draft.clone());
        Ok(())
    }

    async fn get(&self, attempt_id: AttemptId) -> Result<Option<AttemptDraftRecord>, StorageError> {
        let guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&attempt_id).cloned())
    }

    async fn delete(&self, attempt_id: AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&attempt_id);
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the two repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressCacheRepository>,
    pub drafts: Arc<dyn AttemptDraftRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressCacheRepository> = Arc::new(repo.clone());
        let drafts: Arc<dyn AttemptDraftRepository> = Arc::new(repo);
        Self { progress, drafts }
    }
}
