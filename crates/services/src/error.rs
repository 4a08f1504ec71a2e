//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{
    AnswerSchemaError, AttemptError, AttemptId, QuestionId, QuizId, QuizMode,
};
use storage::repository::StorageError;

use crate::gateway::GatewayError;

/// Failures across the attempt lifecycle.
///
/// Policy failures (`EmptyQuiz`, `NotResumable`, `AlreadySubmitted`) are
/// expected terminal states; `AlreadyActive` is the one concurrency conflict
/// and carries the resumable attempt so recovery is resuming, not retrying
/// creation; schema errors signal a contract break and stop hard; gateway
/// transport errors pass through unresolved.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptFlowError {
    #[error("quiz {0} has no questions")]
    EmptyQuiz(QuizId),

    #[error("attempt {0} can no longer be resumed")]
    NotResumable(AttemptId),

    #[error("an attempt is already in progress")]
    AlreadyActive { resumable: Option<AttemptId> },

    #[error("operation requires {expected:?} mode")]
    WrongMode { expected: QuizMode },

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("no attempt session is loaded")]
    NoSession,

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Schema(#[from] AnswerSchemaError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures while caching or reconciling lecture progress.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
