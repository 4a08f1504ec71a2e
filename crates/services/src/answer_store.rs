use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use course_core::model::{
    AnswerSchemaError, AnswerValue, AnswerWarning, AttemptId, QuestionId, QuizDefinition, QuizId,
    validate_answer,
};
use storage::repository::{AttemptDraftRecord, AttemptDraftRepository, StorageError};

//
// ─── AUTOSAVE ──────────────────────────────────────────────────────────────────
//

/// Interval-based autosave decision.
///
/// There is no timer in here: the host's tick asks `is_due` and calls
/// `save_now` when it answers yes. Teardown is therefore just "stop ticking";
/// critical transitions call `save_now` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosavePolicy {
    interval: Duration,
    last_saved_at: DateTime<Utc>,
}

impl AutosavePolicy {
    #[must_use]
    pub fn new(interval_seconds: u32, now: DateTime<Utc>) -> Self {
        Self {
            interval: Duration::seconds(i64::from(interval_seconds)),
            last_saved_at: now,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_saved_at >= self.interval
    }

    pub fn mark_saved(&mut self, now: DateTime<Utc>) {
        self.last_saved_at = now;
    }
}

//
// ─── ANSWER STORE ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerStoreError {
    #[error("question index {index} out of range (total {total})")]
    IndexOutOfRange { index: usize, total: usize },
}

/// In-memory answers plus per-question time/flag bookkeeping for one attempt.
///
/// Elapsed time is attributed to the question being *left*: navigation
/// commits the outgoing question's seconds before switching, so time typed
/// into question B never lands on question A.
pub struct AnswerStore {
    question_order: Vec<QuestionId>,
    answers: BTreeMap<QuestionId, AnswerValue>,
    flagged: BTreeSet<QuestionId>,
    seconds_per_question: BTreeMap<QuestionId, u32>,
    current_index: usize,
    current_entered_at: Option<DateTime<Utc>>,
    dirty: bool,
    autosave: Option<AutosavePolicy>,
}

impl AnswerStore {
    /// Empty store for a quiz, with timing started on the first question.
    #[must_use]
    pub fn for_quiz(quiz: &QuizDefinition, now: DateTime<Utc>) -> Self {
        let question_order: Vec<QuestionId> = quiz.questions().iter().map(|q| q.id).collect();
        let current_entered_at = (!question_order.is_empty()).then_some(now);
        Self {
            question_order,
            answers: BTreeMap::new(),
            flagged: BTreeSet::new(),
            seconds_per_question: BTreeMap::new(),
            current_index: 0,
            current_entered_at,
            dirty: false,
            autosave: None,
        }
    }

    /// Enable interval autosave. Writes happen on the host's tick, bounding
    /// write volume to one per interval rather than one per keystroke.
    #[must_use]
    pub fn with_autosave(mut self, interval_seconds: u32, now: DateTime<Utc>) -> Self {
        self.autosave = Some(AutosavePolicy::new(interval_seconds, now));
        self
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.question_order.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<QuestionId> {
        self.question_order.get(self.current_index).copied()
    }

    #[must_use]
    pub fn answer(&self, question: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&question)
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, AnswerValue> {
        &self.answers
    }

    /// Upsert an answer. The latest value wins; there is no history.
    pub fn update_answer(&mut self, question: QuestionId, value: AnswerValue) {
        self.answers.insert(question, value);
        self.dirty = true;
    }

    /// Flagging is independent of answering.
    pub fn toggle_flag(&mut self, question: QuestionId) {
        if !self.flagged.remove(&question) {
            self.flagged.insert(question);
        }
        self.dirty = true;
    }

    #[must_use]
    pub fn is_flagged(&self, question: QuestionId) -> bool {
        self.flagged.contains(&question)
    }

    #[must_use]
    pub fn flagged(&self) -> &BTreeSet<QuestionId> {
        &self.flagged
    }

    #[must_use]
    pub fn seconds_spent(&self, question: QuestionId) -> u32 {
        self.seconds_per_question.get(&question).copied().unwrap_or(0)
    }

    /// Commit time-spent for the outgoing question, then switch.
    ///
    /// # Errors
    ///
    /// Returns `AnswerStoreError::IndexOutOfRange` for an index past the end.
    pub fn go_to_question(
        &mut self,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<(), AnswerStoreError> {
        if index >= self.question_order.len() {
            return Err(AnswerStoreError::IndexOutOfRange {
                index,
                total: self.question_order.len(),
            });
        }
        self.commit_elapsed(now);
        self.current_index = index;
        self.current_entered_at = Some(now);
        Ok(())
    }

    /// Attribute elapsed time to the current question without switching.
    /// Used at save points and teardown.
    pub fn commit_elapsed(&mut self, now: DateTime<Utc>) {
        let (Some(entered_at), Some(question)) = (self.current_entered_at, self.current_question())
        else {
            return;
        };
        let elapsed = (now - entered_at).num_seconds().max(0);
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        if elapsed > 0 {
            *self.seconds_per_question.entry(question).or_insert(0) += elapsed;
            self.dirty = true;
        }
        self.current_entered_at = Some(now);
    }

    /// Questions with a non-empty answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_empty()).count()
    }

    /// answered/total, in [0, 1].
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.question_order.is_empty() {
            return 0.0;
        }
        self.answered_count() as f64 / self.question_order.len() as f64
    }

    /// Pre-submit validation over the whole quiz.
    ///
    /// Unanswered, empty-selection and short-text findings come back as
    /// warnings and never block. A shape that does not fit its question kind
    /// is a hard error.
    ///
    /// # Errors
    ///
    /// Returns `AnswerSchemaError` on the first malformed answer shape.
    pub fn validate_all(
        &self,
        quiz: &QuizDefinition,
    ) -> Result<Vec<AnswerWarning>, AnswerSchemaError> {
        let mut warnings = Vec::new();
        for question in quiz.questions() {
            match self.answers.get(&question.id) {
                Some(value) => {
                    warnings.extend(validate_answer(question.id, question.kind, value)?);
                }
                None => warnings.push(AnswerWarning::Unanswered(question.id)),
            }
        }
        Ok(warnings)
    }

    /// True when there are unsaved changes and the autosave interval has
    /// elapsed.
    #[must_use]
    pub fn autosave_due(&self, now: DateTime<Utc>) -> bool {
        self.dirty && self.autosave.is_some_and(|policy| policy.is_due(now))
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the buffered state for reload resilience.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be written.
    pub async fn save_now(
        &mut self,
        repo: &dyn AttemptDraftRepository,
        attempt_id: AttemptId,
        quiz_id: QuizId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.commit_elapsed(now);
        repo.put(&self.to_draft(attempt_id, quiz_id, now)).await?;
        if let Some(policy) = &mut self.autosave {
            policy.mark_saved(now);
        }
        self.dirty = false;
        Ok(())
    }

    /// Restore buffered state after a reload. Timing restarts at `now`.
    pub fn hydrate(&mut self, draft: AttemptDraftRecord, now: DateTime<Utc>) {
        self.answers = draft.answers;
        self.flagged = draft.flagged;
        self.seconds_per_question = draft.seconds_per_question;
        let index = draft.current_question_index as usize;
        self.current_index = index.min(self.question_order.len().saturating_sub(1));
        self.current_entered_at = (!self.question_order.is_empty()).then_some(now);
        self.dirty = false;
    }

    #[must_use]
    pub fn to_draft(
        &self,
        attempt_id: AttemptId,
        quiz_id: QuizId,
        now: DateTime<Utc>,
    ) -> AttemptDraftRecord {
        AttemptDraftRecord {
            attempt_id,
            quiz_id,
            answers: self.answers.clone(),
            flagged: self.flagged.clone(),
            seconds_per_question: self.seconds_per_question.clone(),
            current_question_index: u32::try_from(self.current_index).unwrap_or(u32::MAX),
            updated_at: now,
        }
    }
}
