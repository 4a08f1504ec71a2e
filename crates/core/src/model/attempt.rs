use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::answer::AnswerValue;
use crate::model::ids::{AttemptId, QuestionId, QuizId, UserId};

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Attempt lifecycle. Transitions are monotonic: there is no way back.
///
/// `InProgress → Submitted → Finalized`, with the practice-mode shortcut
/// `InProgress → Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Finalized,
}

impl AttemptStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Finalized => "finalized",
        }
    }

    /// True when `next` is a legal forward move from this status.
    #[must_use]
    pub fn can_advance_to(&self, next: AttemptStatus) -> bool {
        matches!(
            (self, next),
            (AttemptStatus::InProgress, AttemptStatus::Submitted)
                | (AttemptStatus::InProgress, AttemptStatus::Finalized)
                | (AttemptStatus::Submitted, AttemptStatus::Finalized)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt is {0:?}, not in progress")]
    NotInProgress(AttemptStatus),

    #[error("illegal attempt transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: AttemptStatus,
        to: AttemptStatus,
    },

    #[error("attempt already submitted")]
    AlreadySubmitted,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One learner's pass through a quiz definition.
///
/// Holds the answer map and score; the invariant that at most one attempt per
/// (user, quiz) is `InProgress` lives on the server and is only *reported*
/// here, never reconciled away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    id: AttemptId,
    quiz_id: QuizId,
    user_id: UserId,
    started_at: DateTime<Utc>,
    status: AttemptStatus,
    answers: BTreeMap<QuestionId, AnswerValue>,
    score_percent: Option<f64>,
}

impl Attempt {
    /// A freshly created attempt, as the server would return it.
    #[must_use]
    pub fn started(
        id: AttemptId,
        quiz_id: QuizId,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            quiz_id,
            user_id,
            started_at,
            status: AttemptStatus::InProgress,
            answers: BTreeMap::new(),
            score_percent: None,
        }
    }

    /// Rehydrate an attempt from a server snapshot or local draft.
    #[must_use]
    pub fn from_persisted(
        id: AttemptId,
        quiz_id: QuizId,
        user_id: UserId,
        started_at: DateTime<Utc>,
        status: AttemptStatus,
        answers: BTreeMap<QuestionId, AnswerValue>,
        score_percent: Option<f64>,
    ) -> Self {
        Self {
            id,
            quiz_id,
            user_id,
            started_at,
            status,
            answers,
            score_percent,
        }
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, AnswerValue> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, question: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&question)
    }

    /// Number of questions with a non-empty answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_empty()).count()
    }

    #[must_use]
    pub fn score_percent(&self) -> Option<f64> {
        self.score_percent
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// Record (or overwrite) an answer. Idempotent per question: a
    /// resubmission replaces the prior value, it never double-counts.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` once the attempt has moved on.
    pub fn record_answer(
        &mut self,
        question: QuestionId,
        value: AnswerValue,
    ) -> Result<(), AttemptError> {
        if self.status != AttemptStatus::InProgress {
            return Err(AttemptError::NotInProgress(self.status));
        }
        self.answers.insert(question, value);
        Ok(())
    }

    /// Replace the running score. Only meaningful while in progress or at the
    /// moment of submission.
    pub fn record_score(&mut self, percent: f64) {
        self.score_percent = Some(percent.clamp(0.0, 100.0));
    }

    /// Move the attempt forward.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` on any backward or repeated
    /// move; `Submitted → Submitted` maps to `AlreadySubmitted` so callers can
    /// surface it as the distinct policy failure it is.
    pub fn advance_to(&mut self, next: AttemptStatus) -> Result<(), AttemptError> {
        if self.status == AttemptStatus::Submitted && next == AttemptStatus::Submitted {
            return Err(AttemptError::AlreadySubmitted);
        }
        if !self.status.can_advance_to(next) {
            return Err(AttemptError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
