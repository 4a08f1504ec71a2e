//! Remote contracts for the quiz/attempt service and the progress service.
//!
//! The engine never retries these calls; transport failures go back to the
//! caller unresolved, and the one conflict the server can report (a second
//! in-progress attempt) is kept distinct so recovery can be "resume", not
//! "retry creation".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use course_core::model::{
    AnswerValue, Attempt, AttemptId, CourseId, CourseTotals, LectureId, LectureProgressRecord,
    QuestionId, QuizDefinition, QuizId,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The server already holds an in-progress attempt for this (user, quiz).
    /// Carries the resumable attempt id when the server reports it.
    #[error("an in-progress attempt already exists")]
    Conflict { active_attempt_id: Option<AttemptId> },

    #[error("resource not found")]
    NotFound,

    /// The server rejected the request as a policy matter (e.g. attempt
    /// already submitted). Terminal, not retryable.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected status {0}")]
    HttpStatus(reqwest::StatusCode),

    /// Transient transport failure. Returned unresolved; callers decide.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

/// Quiz definition plus the learner's existing attempts for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizBundle {
    pub quiz: QuizDefinition,
    pub attempts: Vec<Attempt>,
}

impl QuizBundle {
    /// The attempt the learner could resume, if the server holds one.
    #[must_use]
    pub fn active_attempt(&self) -> Option<&Attempt> {
        self.attempts.iter().find(|a| a.is_in_progress())
    }
}

/// Per-question grading result in practice mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub is_correct: Option<bool>,
    pub correct_answer: Option<AnswerValue>,
    pub explanation: Option<String>,
    pub points_earned: u32,
    pub current_score_percent: f64,
    pub answered_count: u32,
    pub total_count: u32,
}

/// One (question, answer) pair in an exam batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

/// Server response to a progress merge: its per-lecture records after
/// absorbing the batch, plus the denominators for snapshot derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedProgress {
    pub lectures: Vec<LectureProgressRecord>,
    pub totals: CourseTotals,
}

/// Server response to a single-lecture progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureUpdate {
    pub lecture: LectureProgressRecord,
    pub course: MergedProgress,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Quiz/attempt endpoints. Opaque request/response; wire format is the
/// gateway implementation's concern.
#[async_trait]
pub trait QuizGateway: Send + Sync {
    /// Fetch a quiz definition together with the learner's attempts.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or server failures.
    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<QuizBundle, GatewayError>;

    /// Create a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Conflict` when an in-progress attempt exists.
    async fn create_attempt(&self, quiz_id: QuizId) -> Result<Attempt, GatewayError>;

    /// Load an existing attempt for resumption.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or server failures.
    async fn resume_attempt(&self, attempt_id: AttemptId) -> Result<Attempt, GatewayError>;

    /// Grade one answer immediately (practice mode).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or server failures.
    async fn submit_question_answer(
        &self,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        question_id: QuestionId,
        answer: &AnswerValue,
    ) -> Result<AnswerFeedback, GatewayError>;

    /// Atomically submit the whole answer set (exam mode).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` for an already-submitted attempt.
    async fn submit_attempt(
        &self,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        answers: &[SubmittedAnswer],
    ) -> Result<(), GatewayError>;

    /// Close out an attempt. Safe to repeat; the server treats it as
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or server failures.
    async fn finalize_attempt(
        &self,
        quiz_id: QuizId,
        attempt_id: AttemptId,
    ) -> Result<(), GatewayError>;
}

/// Progress endpoints. The merge endpoint must be safely repeatable; the
/// engine replays it after timeouts without deduplication.
#[async_trait]
pub trait ProgressGateway: Send + Sync {
    /// Merge a batch of locally cached records into the server's snapshot.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or server failures.
    async fn merge_progress(
        &self,
        course_id: CourseId,
        local: &[LectureProgressRecord],
    ) -> Result<MergedProgress, GatewayError>;

    /// Push one lecture's progress immediately.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on transport or server failures.
    async fn update_lecture_progress(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
        data: &LectureProgressRecord,
    ) -> Result<LectureUpdate, GatewayError>;
}
