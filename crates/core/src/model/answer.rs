use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::quiz::QuestionKind;

/// Free text shorter than this draws a warning at pre-flight.
pub const SHORT_TEXT_THRESHOLD: usize = 10;

//
// ─── ANSWER VALUE ──────────────────────────────────────────────────────────────
//

/// One learner answer, tagged by shape.
///
/// Dispatch over this union is exhaustive; there is no runtime type sniffing
/// anywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Single option key, for choice and true/false questions.
    Choice(String),
    /// Multiple option keys, for multi-select questions.
    Selection(Vec<String>),
    /// Free text.
    Text(String),
}

impl AnswerValue {
    /// The empty answer of the right shape for `kind`, used when scoring
    /// unanswered questions at submission.
    #[must_use]
    pub fn empty_for(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Choice | QuestionKind::TrueFalse => AnswerValue::Choice(String::new()),
            QuestionKind::MultiSelect => AnswerValue::Selection(Vec::new()),
            QuestionKind::Text => AnswerValue::Text(String::new()),
        }
    }

    /// True when the answer carries no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Choice(s) | AnswerValue::Text(s) => s.trim().is_empty(),
            AnswerValue::Selection(items) => items.is_empty(),
        }
    }

    #[must_use]
    pub fn shape_name(&self) -> &'static str {
        match self {
            AnswerValue::Choice(_) => "choice",
            AnswerValue::Selection(_) => "selection",
            AnswerValue::Text(_) => "text",
        }
    }
}

//
// ─── VALIDATION ────────────────────────────────────────────────────────────────
//

/// Hard contract break: the answer shape does not fit the question kind.
/// Never silently coerced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerSchemaError {
    #[error("question {question} expects a {expected} answer, got {got}")]
    ShapeMismatch {
        question: QuestionId,
        expected: QuestionKind,
        got: &'static str,
    },
}

/// Informational pre-flight findings. Warnings never block submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerWarning {
    Unanswered(QuestionId),
    EmptySelection(QuestionId),
    ShortText { question: QuestionId, len: usize },
}

/// Check one answer against its question kind.
///
/// # Errors
///
/// Returns `AnswerSchemaError` when the shape does not match the kind.
pub fn validate_answer(
    question: QuestionId,
    kind: QuestionKind,
    value: &AnswerValue,
) -> Result<Vec<AnswerWarning>, AnswerSchemaError> {
    let mut warnings = Vec::new();
    match (kind, value) {
        (QuestionKind::Choice | QuestionKind::TrueFalse, AnswerValue::Choice(s)) => {
            if s.trim().is_empty() {
                warnings.push(AnswerWarning::Unanswered(question));
            }
        }
        (QuestionKind::MultiSelect, AnswerValue::Selection(items)) => {
            if items.is_empty() {
                warnings.push(AnswerWarning::EmptySelection(question));
            }
        }
        (QuestionKind::Text, AnswerValue::Text(s)) => {
            let len = s.trim().len();
            if len == 0 {
                warnings.push(AnswerWarning::Unanswered(question));
            } else if len < SHORT_TEXT_THRESHOLD {
                warnings.push(AnswerWarning::ShortText { question, len });
            }
        }
        (expected, got) => {
            return Err(AnswerSchemaError::ShapeMismatch {
                question,
                expected,
                got: got.shape_name(),
            });
        }
    }
    Ok(warnings)
}
