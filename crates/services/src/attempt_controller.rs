//! Attempt lifecycle orchestration.
//!
//! The controller owns one attempt session at a time: the quiz definition,
//! the server-side attempt, the local answer buffer and the countdown. All
//! state transitions are confirmed by the gateway before the local attempt
//! advances, so the local status never runs ahead of the server's.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use course_core::model::{
    AnswerValue, Attempt, AttemptId, AttemptStatus, QuestionId, QuizDefinition, QuizId, QuizMode,
};
use course_core::time::Clock;
use course_core::timer::{QuizTimer, TimerError, TimerEvent};
use storage::repository::AttemptDraftRepository;

use crate::answer_store::{AnswerStore, AnswerStoreError};
use crate::error::AttemptFlowError;
use crate::gateway::{AnswerFeedback, GatewayError, QuizGateway, SubmittedAnswer};

/// Default seconds between draft autosaves.
pub const AUTOSAVE_INTERVAL_SECONDS: u32 = 30;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

struct AttemptSession {
    quiz: QuizDefinition,
    attempt: Attempt,
    store: AnswerStore,
    timer: Option<QuizTimer>,
    is_resuming: bool,
    last_feedback: Option<AnswerFeedback>,
}

/// Read-only summary of the loaded session, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptView {
    pub quiz_id: QuizId,
    pub attempt_id: AttemptId,
    pub status: AttemptStatus,
    pub mode: QuizMode,
    pub is_resuming: bool,
    pub current_index: usize,
    pub answered_count: usize,
    pub total_questions: usize,
    pub score_percent: Option<f64>,
    /// `None` for untimed quizzes.
    pub time_remaining_seconds: Option<u32>,
    pub is_low_time: bool,
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

pub struct AttemptController {
    clock: Clock,
    gateway: Arc<dyn QuizGateway>,
    drafts: Arc<dyn AttemptDraftRepository>,
    session: Option<AttemptSession>,
}

impl AttemptController {
    #[must_use]
    pub fn new(
        clock: Clock,
        gateway: Arc<dyn QuizGateway>,
        drafts: Arc<dyn AttemptDraftRepository>,
    ) -> Self {
        Self {
            clock,
            gateway,
            drafts,
            session: None,
        }
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Load a quiz and either resume the given (or server-reported) active
    /// attempt or start a fresh one.
    ///
    /// The empty-quiz check runs before any attempt is created, so a broken
    /// definition never leaves an unfinishable attempt behind.
    ///
    /// # Errors
    ///
    /// Returns `EmptyQuiz` for a definition without questions, `NotResumable`
    /// when the requested attempt has already closed, and `AlreadyActive`
    /// when the server refuses a second concurrent attempt.
    pub async fn resume_or_start(
        &mut self,
        quiz_id: QuizId,
        resume: Option<AttemptId>,
    ) -> Result<AttemptView, AttemptFlowError> {
        let bundle = self.gateway.fetch_quiz(quiz_id).await?;
        if bundle.quiz.is_empty() {
            return Err(AttemptFlowError::EmptyQuiz(quiz_id));
        }

        let (attempt, is_resuming) = match resume {
            Some(attempt_id) => {
                let attempt = self.gateway.resume_attempt(attempt_id).await?;
                if !attempt.is_in_progress() {
                    return Err(AttemptFlowError::NotResumable(attempt_id));
                }
                (attempt, true)
            }
            None => match bundle.active_attempt() {
                Some(active) => (self.gateway.resume_attempt(active.id()).await?, true),
                None => match self.gateway.create_attempt(quiz_id).await {
                    Ok(attempt) => (attempt, false),
                    Err(GatewayError::Conflict { active_attempt_id }) => {
                        return Err(AttemptFlowError::AlreadyActive {
                            resumable: active_attempt_id,
                        });
                    }
                    Err(other) => return Err(other.into()),
                },
            },
        };

        let now = self.clock.now();
        let mut store = AnswerStore::for_quiz(&bundle.quiz, now)
            .with_autosave(AUTOSAVE_INTERVAL_SECONDS, now);
        for (question, value) in attempt.answers() {
            store.update_answer(*question, value.clone());
        }
        if let Some(draft) = self.drafts.get(attempt.id()).await? {
            debug!(attempt = %attempt.id(), "restoring local draft");
            store.hydrate(draft, now);
        }

        // A resumed timed attempt restarts its countdown from the full limit;
        // elapsed offline time is not counted against the learner.
        let timer = QuizTimer::start(bundle.quiz.time_limit_minutes());

        debug!(
            quiz = %quiz_id,
            attempt = %attempt.id(),
            resuming = is_resuming,
            timed = timer.is_some(),
            "attempt session loaded"
        );

        let session = AttemptSession {
            quiz: bundle.quiz,
            attempt,
            store,
            timer,
            is_resuming,
            last_feedback: None,
        };
        let view = Self::view_of(&session);
        self.session = Some(session);
        Ok(view)
    }

    fn session(&self) -> Result<&AttemptSession, AttemptFlowError> {
        self.session.as_ref().ok_or(AttemptFlowError::NoSession)
    }

    fn session_mut(&mut self) -> Result<&mut AttemptSession, AttemptFlowError> {
        self.session.as_mut().ok_or(AttemptFlowError::NoSession)
    }

    /// Buffer an answer locally (exam flow, or pre-grade edits in practice).
    ///
    /// # Errors
    ///
    /// Returns `UnknownQuestion` for an id outside the quiz, `Schema` for a
    /// value whose shape does not fit the question, and `Attempt` once the
    /// attempt is no longer in progress.
    pub fn update_answer(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<(), AttemptFlowError> {
        let session = self.session_mut()?;
        let question = session
            .quiz
            .question(question_id)
            .ok_or(AttemptFlowError::UnknownQuestion(question_id))?;
        course_core::model::validate_answer(question_id, question.kind, &value)?;
        session.attempt.record_answer(question_id, value.clone())?;
        session.store.update_answer(question_id, value);
        Ok(())
    }

    /// Submit one answer for immediate grading (practice mode only).
    ///
    /// # Errors
    ///
    /// Returns `WrongMode` in exam mode; otherwise the same failures as
    /// [`Self::update_answer`], plus gateway failures.
    pub async fn submit_answer(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<AnswerFeedback, AttemptFlowError> {
        {
            let session = self.session()?;
            if session.quiz.mode() != QuizMode::Practice {
                return Err(AttemptFlowError::WrongMode {
                    expected: QuizMode::Practice,
                });
            }
        }
        self.update_answer(question_id, value.clone())?;

        let (quiz_id, attempt_id) = {
            let session = self.session()?;
            (session.quiz.id(), session.attempt.id())
        };
        let feedback = self
            .gateway
            .submit_question_answer(quiz_id, attempt_id, question_id, &value)
            .await?;

        let session = self.session_mut()?;
        session.attempt.record_score(feedback.current_score_percent);
        session.last_feedback = Some(feedback.clone());
        Ok(feedback)
    }

    #[must_use]
    pub fn last_feedback(&self) -> Option<&AnswerFeedback> {
        self.session.as_ref().and_then(|s| s.last_feedback.as_ref())
    }

    /// Submit the whole attempt atomically (exam mode only).
    ///
    /// Unanswered questions are filled with their kind's empty value, so the
    /// server always receives a complete answer set. The local status only
    /// advances after the server accepts the batch.
    ///
    /// # Errors
    ///
    /// Returns `WrongMode` in practice mode and `Attempt(AlreadySubmitted)`
    /// on a repeated submission.
    pub async fn submit(&mut self) -> Result<AttemptView, AttemptFlowError> {
        let (quiz_id, attempt_id, answers) = {
            let session = self.session()?;
            if session.quiz.mode() != QuizMode::Exam {
                return Err(AttemptFlowError::WrongMode {
                    expected: QuizMode::Exam,
                });
            }
            if session.attempt.status() == AttemptStatus::Submitted {
                return Err(course_core::model::AttemptError::AlreadySubmitted.into());
            }
            let answers: Vec<SubmittedAnswer> = session
                .quiz
                .questions()
                .iter()
                .map(|q| SubmittedAnswer {
                    question_id: q.id,
                    value: session
                        .store
                        .answer(q.id)
                        .cloned()
                        .unwrap_or_else(|| AnswerValue::empty_for(q.kind)),
                })
                .collect();
            (session.quiz.id(), session.attempt.id(), answers)
        };

        self.gateway
            .submit_attempt(quiz_id, attempt_id, &answers)
            .await?;

        let session = self.session_mut()?;
        session.attempt.advance_to(AttemptStatus::Submitted)?;
        self.drafts.delete(attempt_id).await?;
        debug!(attempt = %attempt_id, "attempt submitted");
        self.view()
    }

    /// Close out the attempt. Idempotent: finalizing a finalized attempt is
    /// a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns gateway or storage failures; the local status only advances
    /// after the server acknowledges.
    pub async fn finalize(&mut self) -> Result<AttemptView, AttemptFlowError> {
        let (quiz_id, attempt_id, status) = {
            let session = self.session()?;
            (
                session.quiz.id(),
                session.attempt.id(),
                session.attempt.status(),
            )
        };
        if status == AttemptStatus::Finalized {
            return self.view();
        }

        self.gateway.finalize_attempt(quiz_id, attempt_id).await?;

        let session = self.session_mut()?;
        session.attempt.advance_to(AttemptStatus::Finalized)?;
        self.drafts.delete(attempt_id).await?;
        debug!(attempt = %attempt_id, "attempt finalized");
        self.view()
    }

    /// Navigate to a question, attributing elapsed time to the one being left.
    ///
    /// # Errors
    ///
    /// Returns `AnswerStoreError::IndexOutOfRange` for an index past the end.
    pub fn go_to_question(&mut self, index: usize) -> Result<(), AnswerStoreError> {
        let now = self.clock.now();
        match self.session.as_mut() {
            Some(session) => session.store.go_to_question(index, now),
            None => Ok(()),
        }
    }

    pub fn toggle_flag(&mut self, question_id: QuestionId) {
        if let Some(session) = self.session.as_mut() {
            session.store.toggle_flag(question_id);
        }
    }

    /// Drive the session forward one second.
    ///
    /// Runs the countdown, autosaves the draft when due, and on expiry forces
    /// the attempt closed: exam attempts are submitted with whatever answers
    /// exist, practice attempts are finalized. The forced close happens once,
    /// because expiry fires once.
    ///
    /// # Errors
    ///
    /// Returns the forced submission's failure, or a storage failure from
    /// autosave.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<TimerEvent>, AttemptFlowError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        let event = session.timer.as_mut().and_then(QuizTimer::tick);

        if session.store.autosave_due(now) {
            let attempt_id = session.attempt.id();
            let quiz_id = session.quiz.id();
            session
                .store
                .save_now(self.drafts.as_ref(), attempt_id, quiz_id, now)
                .await?;
            debug!(attempt = %attempt_id, "draft autosaved");
        }

        if event == Some(TimerEvent::Expired) {
            let mode = session.quiz.mode();
            warn!(attempt = %session.attempt.id(), ?mode, "time expired, forcing close");
            match mode {
                QuizMode::Exam => {
                    self.submit().await?;
                }
                QuizMode::Practice => {
                    self.finalize().await?;
                }
            }
        }
        Ok(event)
    }

    /// Persist the draft immediately, regardless of the autosave interval.
    ///
    /// # Errors
    ///
    /// Returns a storage failure if the draft cannot be written.
    pub async fn save_draft(&mut self, now: DateTime<Utc>) -> Result<(), AttemptFlowError> {
        let session = self.session.as_mut().ok_or(AttemptFlowError::NoSession)?;
        let attempt_id = session.attempt.id();
        let quiz_id = session.quiz.id();
        session
            .store
            .save_now(self.drafts.as_ref(), attempt_id, quiz_id, now)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `TimerError::NotRunning` when there is nothing to pause.
    pub fn pause_timer(&mut self) -> Result<(), TimerError> {
        match self.session.as_mut().and_then(|s| s.timer.as_mut()) {
            Some(timer) => timer.pause(),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Returns `TimerError::NotPaused` when the timer is not paused.
    pub fn resume_timer(&mut self) -> Result<(), TimerError> {
        match self.session.as_mut().and_then(|s| s.timer.as_mut()) {
            Some(timer) => timer.resume(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&QuizDefinition> {
        self.session.as_ref().map(|s| &s.quiz)
    }

    #[must_use]
    pub fn store(&self) -> Option<&AnswerStore> {
        self.session.as_ref().map(|s| &s.store)
    }

    /// Current session summary.
    ///
    /// # Errors
    ///
    /// Returns `NoSession` when nothing is loaded.
    pub fn view(&self) -> Result<AttemptView, AttemptFlowError> {
        Ok(Self::view_of(self.session()?))
    }

    fn view_of(session: &AttemptSession) -> AttemptView {
        AttemptView {
            quiz_id: session.quiz.id(),
            attempt_id: session.attempt.id(),
            status: session.attempt.status(),
            mode: session.quiz.mode(),
            is_resuming: session.is_resuming,
            current_index: session.store.current_index(),
            answered_count: session.store.answered_count(),
            total_questions: session.store.total_questions(),
            score_percent: session.attempt.score_percent(),
            time_remaining_seconds: session.timer.as_ref().map(QuizTimer::remaining_seconds),
            is_low_time: session
                .timer
                .as_ref()
                .is_some_and(QuizTimer::is_low_time),
        }
    }
}
