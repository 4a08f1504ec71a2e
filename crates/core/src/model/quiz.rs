use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::answer::AnswerValue;
use crate::model::ids::{QuestionId, QuizId};

//
// ─── QUESTION KINDS ────────────────────────────────────────────────────────────
//

/// The four question shapes the engine understands.
///
/// Anything else coming off the wire is a contract break, not a new kind to
/// coerce into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Choice,
    TrueFalse,
    MultiSelect,
    Text,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Choice => "choice",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::MultiSelect => "multi_select",
            QuestionKind::Text => "text",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Practice gives per-question feedback; exam requires one atomic submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    Practice,
    Exam,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Choice options; empty for free-text questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Reference answer, when the definition carries one (practice feedback).
    #[serde(default)]
    pub correct_answer: Option<AnswerValue>,
    pub points: u32,
}

//
// ─── QUIZ DEFINITION ───────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("passing score must be at most 100, got {0}")]
    InvalidPassingScore(u8),

    #[error("duplicate question id {0} in quiz definition")]
    DuplicateQuestion(QuestionId),
}

/// A quiz as served by the catalog. Immutable for the lifetime of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDefinition {
    id: QuizId,
    title: String,
    questions: Vec<Question>,
    passing_score_percent: u8,
    time_limit_minutes: Option<u32>,
    mode: QuizMode,
}

impl QuizDefinition {
    /// Build a definition, checking structural invariants.
    ///
    /// An empty question list is allowed here: refusing to start an attempt
    /// against it is attempt policy, not a malformed definition.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` for an out-of-range passing score or duplicate
    /// question ids.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        passing_score_percent: u8,
        time_limit_minutes: Option<u32>,
        mode: QuizMode,
    ) -> Result<Self, QuizError> {
        if passing_score_percent > 100 {
            return Err(QuizError::InvalidPassingScore(passing_score_percent));
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id) {
                return Err(QuizError::DuplicateQuestion(q.id));
            }
        }
        Ok(Self {
            id,
            title: title.into(),
            questions,
            passing_score_percent,
            time_limit_minutes,
            mode,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Questions in presentation order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// A quiz with zero questions is a policy exit, never a submission path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn passing_score_percent(&self) -> u8 {
        self.passing_score_percent
    }

    /// `None` (or zero, normalized by the timer) means untimed.
    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64) -> Question {
        Question {
            id: QuestionId::new(id),
            kind: QuestionKind::Choice,
            prompt: format!("Q{id}"),
            options: vec!["a".into(), "b".into()],
            correct_answer: Some(AnswerValue::Choice("a".into())),
            points: 10,
        }
    }

    #[test]
    fn rejects_passing_score_above_100() {
        let err = QuizDefinition::new(
            QuizId::new(1),
            "Quiz",
            vec![question(1)],
            101,
            None,
            QuizMode::Practice,
        )
        .unwrap_err();
        assert_eq!(err, QuizError::InvalidPassingScore(101));
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let err = QuizDefinition::new(
            QuizId::new(1),
            "Quiz",
            vec![question(1), question(1)],
            70,
            None,
            QuizMode::Exam,
        )
        .unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new(1)));
    }

    #[test]
    fn empty_definition_is_valid_but_flagged() {
        let quiz = QuizDefinition::new(
            QuizId::new(1),
            "Empty",
            Vec::new(),
            70,
            None,
            QuizMode::Practice,
        )
        .unwrap();
        assert!(quiz.is_empty());
        assert_eq!(quiz.total_points(), 0);
    }

    #[test]
    fn looks_up_questions_by_id_and_index() {
        let quiz = QuizDefinition::new(
            QuizId::new(1),
            "Quiz",
            vec![question(1), question(2)],
            70,
            Some(30),
            QuizMode::Exam,
        )
        .unwrap();
        assert_eq!(quiz.question(QuestionId::new(2)).unwrap().prompt, "Q2");
        assert_eq!(quiz.question_at(0).unwrap().id, QuestionId::new(1));
        assert!(quiz.question(QuestionId::new(9)).is_none());
        assert_eq!(quiz.total_points(), 20);
    }
}
