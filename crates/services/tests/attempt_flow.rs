//! End-to-end attempt lifecycle against a scripted gateway.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Duration;

use course_core::model::{
    AnswerValue, Attempt, AttemptId, AttemptStatus, Question, QuestionId, QuestionKind,
    QuizDefinition, QuizId, QuizMode, UserId,
};
use course_core::time::{fixed_clock, fixed_now};
use course_core::timer::TimerEvent;
use services::{
    AnswerFeedback, AttemptController, AttemptFlowError, CourseSessionServices, GatewayError,
    ProgressGateway, QuizBundle, QuizGateway, SubmittedAnswer,
};
use storage::repository::{InMemoryRepository, Storage};

const QUIZ: QuizId = QuizId::new(5);
const USER: UserId = UserId::new(1);

//
// ─── SCRIPTED GATEWAY ──────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Script {
    /// When set, `create_attempt` answers 409 with this resumable id.
    conflict_with: Option<Option<AttemptId>>,
    /// Attempts returned by `resume_attempt`, keyed by lookup order.
    resumable: Vec<Attempt>,
}

struct FakeQuizGateway {
    bundle: QuizBundle,
    script: Script,
    next_attempt_id: AtomicU64,
    submissions: Mutex<Vec<Vec<SubmittedAnswer>>>,
    finalizations: Mutex<Vec<AttemptId>>,
}

impl FakeQuizGateway {
    fn new(quiz: QuizDefinition) -> Self {
        Self {
            bundle: QuizBundle {
                quiz,
                attempts: Vec::new(),
            },
            script: Script::default(),
            next_attempt_id: AtomicU64::new(100),
            submissions: Mutex::new(Vec::new()),
            finalizations: Mutex::new(Vec::new()),
        }
    }

    fn submissions(&self) -> Vec<Vec<SubmittedAnswer>> {
        self.submissions.lock().unwrap().clone()
    }

    fn finalizations(&self) -> Vec<AttemptId> {
        self.finalizations.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuizGateway for FakeQuizGateway {
    async fn fetch_quiz(&self, _quiz_id: QuizId) -> Result<QuizBundle, GatewayError> {
        Ok(self.bundle.clone())
    }

    async fn create_attempt(&self, quiz_id: QuizId) -> Result<Attempt, GatewayError> {
        if let Some(active_attempt_id) = self.script.conflict_with {
            return Err(GatewayError::Conflict { active_attempt_id });
        }
        let id = AttemptId::new(self.next_attempt_id.fetch_add(1, Ordering::SeqCst));
        Ok(Attempt::started(id, quiz_id, USER, fixed_now()))
    }

    async fn resume_attempt(&self, attempt_id: AttemptId) -> Result<Attempt, GatewayError> {
        self.script
            .resumable
            .iter()
            .find(|a| a.id() == attempt_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn submit_question_answer(
        &self,
        _quiz_id: QuizId,
        _attempt_id: AttemptId,
        question_id: QuestionId,
        answer: &AnswerValue,
    ) -> Result<AnswerFeedback, GatewayError> {
        let correct = self
            .bundle
            .quiz
            .question(question_id)
            .and_then(|q| q.correct_answer.as_ref())
            .map(|expected| expected == answer);
        Ok(AnswerFeedback {
            is_correct: correct,
            correct_answer: None,
            explanation: None,
            points_earned: if correct == Some(true) { 10 } else { 0 },
            current_score_percent: if correct == Some(true) { 100.0 } else { 0.0 },
            answered_count: 1,
            total_count: self.bundle.quiz.question_count() as u32,
        })
    }

    async fn submit_attempt(
        &self,
        _quiz_id: QuizId,
        _attempt_id: AttemptId,
        answers: &[SubmittedAnswer],
    ) -> Result<(), GatewayError> {
        self.submissions.lock().unwrap().push(answers.to_vec());
        Ok(())
    }

    async fn finalize_attempt(
        &self,
        _quiz_id: QuizId,
        attempt_id: AttemptId,
    ) -> Result<(), GatewayError> {
        self.finalizations.lock().unwrap().push(attempt_id);
        Ok(())
    }
}

/// Progress gateway stub for wiring tests; the attempt flow never calls it.
struct NoProgress;

#[async_trait]
impl ProgressGateway for NoProgress {
    async fn merge_progress(
        &self,
        _course_id: course_core::model::CourseId,
        _local: &[course_core::model::LectureProgressRecord],
    ) -> Result<services::MergedProgress, GatewayError> {
        Err(GatewayError::NotFound)
    }

    async fn update_lecture_progress(
        &self,
        _course_id: course_core::model::CourseId,
        _lecture_id: course_core::model::LectureId,
        _data: &course_core::model::LectureProgressRecord,
    ) -> Result<services::LectureUpdate, GatewayError> {
        Err(GatewayError::NotFound)
    }
}

//
// ─── FIXTURES ──────────────────────────────────────────────────────────────────
//

fn question(id: u64, kind: QuestionKind) -> Question {
    Question {
        id: QuestionId::new(id),
        kind,
        prompt: format!("Q{id}"),
        options: match kind {
            QuestionKind::Text => Vec::new(),
            _ => vec!["a".into(), "b".into()],
        },
        correct_answer: match kind {
            QuestionKind::Choice | QuestionKind::TrueFalse => {
                Some(AnswerValue::Choice("a".into()))
            }
            _ => None,
        },
        points: 10,
    }
}

fn exam_quiz(time_limit_minutes: Option<u32>) -> QuizDefinition {
    QuizDefinition::new(
        QUIZ,
        "Exam",
        vec![
            question(1, QuestionKind::Choice),
            question(2, QuestionKind::MultiSelect),
            question(3, QuestionKind::Text),
        ],
        70,
        time_limit_minutes,
        QuizMode::Exam,
    )
    .unwrap()
}

fn practice_quiz() -> QuizDefinition {
    QuizDefinition::new(
        QUIZ,
        "Practice",
        vec![question(1, QuestionKind::Choice), question(2, QuestionKind::TrueFalse)],
        70,
        None,
        QuizMode::Practice,
    )
    .unwrap()
}

fn controller(gateway: Arc<FakeQuizGateway>, drafts: InMemoryRepository) -> AttemptController {
    AttemptController::new(fixed_clock(), gateway, Arc::new(drafts))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn exam_flow_submits_complete_answer_set() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());

    let view = ctl.resume_or_start(QUIZ, None).await.unwrap();
    assert_eq!(view.status, AttemptStatus::InProgress);
    assert!(!view.is_resuming);
    assert_eq!(view.total_questions, 3);

    ctl.update_answer(QuestionId::new(1), AnswerValue::Choice("a".into()))
        .unwrap();
    ctl.update_answer(QuestionId::new(3), AnswerValue::Text("a full sentence".into()))
        .unwrap();

    let view = ctl.submit().await.unwrap();
    assert_eq!(view.status, AttemptStatus::Submitted);

    // The unanswered multi-select went out as an empty selection.
    let submissions = gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].len(), 3);
    assert_eq!(submissions[0][1].value, AnswerValue::Selection(Vec::new()));
}

#[tokio::test]
async fn repeat_submission_is_rejected_locally() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());

    ctl.resume_or_start(QUIZ, None).await.unwrap();
    ctl.submit().await.unwrap();
    let err = ctl.submit().await.unwrap_err();
    assert!(matches!(
        err,
        AttemptFlowError::Attempt(course_core::model::AttemptError::AlreadySubmitted)
    ));
    assert_eq!(gateway.submissions().len(), 1);
}

#[tokio::test]
async fn empty_quiz_refuses_before_creating_an_attempt() {
    let empty =
        QuizDefinition::new(QUIZ, "Empty", Vec::new(), 70, None, QuizMode::Exam).unwrap();
    let gateway = Arc::new(FakeQuizGateway::new(empty));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());

    let err = ctl.resume_or_start(QUIZ, None).await.unwrap_err();
    assert!(matches!(err, AttemptFlowError::EmptyQuiz(id) if id == QUIZ));
    assert!(!ctl.has_session());
    // No attempt was created for the broken definition.
    assert_eq!(gateway.next_attempt_id.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn concurrent_attempt_conflict_carries_resumable_id() {
    let mut gateway = FakeQuizGateway::new(exam_quiz(None));
    gateway.script.conflict_with = Some(Some(AttemptId::new(42)));
    let mut ctl = controller(Arc::new(gateway), InMemoryRepository::new());

    let err = ctl.resume_or_start(QUIZ, None).await.unwrap_err();
    assert!(matches!(
        err,
        AttemptFlowError::AlreadyActive { resumable: Some(id) } if id == AttemptId::new(42)
    ));
}

#[tokio::test]
async fn closed_attempts_cannot_be_resumed() {
    let mut gateway = FakeQuizGateway::new(exam_quiz(None));
    let mut closed = Attempt::started(AttemptId::new(7), QUIZ, USER, fixed_now());
    closed.advance_to(AttemptStatus::Submitted).unwrap();
    gateway.script.resumable.push(closed);
    let mut ctl = controller(Arc::new(gateway), InMemoryRepository::new());

    let err = ctl
        .resume_or_start(QUIZ, Some(AttemptId::new(7)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AttemptFlowError::NotResumable(id) if id == AttemptId::new(7)
    ));
}

#[tokio::test]
async fn practice_answers_grade_immediately_and_batch_submit_is_refused() {
    let gateway = Arc::new(FakeQuizGateway::new(practice_quiz()));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();

    let feedback = ctl
        .submit_answer(QuestionId::new(1), AnswerValue::Choice("a".into()))
        .await
        .unwrap();
    assert_eq!(feedback.is_correct, Some(true));
    assert_eq!(ctl.view().unwrap().score_percent, Some(100.0));
    assert_eq!(ctl.last_feedback(), Some(&feedback));

    let err = ctl.submit().await.unwrap_err();
    assert!(matches!(
        err,
        AttemptFlowError::WrongMode { expected: QuizMode::Exam }
    ));
}

#[tokio::test]
async fn exam_mode_refuses_per_question_grading() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let mut ctl = controller(gateway, InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();

    let err = ctl
        .submit_answer(QuestionId::new(1), AnswerValue::Choice("a".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AttemptFlowError::WrongMode { expected: QuizMode::Practice }
    ));
}

#[tokio::test]
async fn unknown_question_and_bad_shape_are_rejected() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let mut ctl = controller(gateway, InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();

    let err = ctl
        .update_answer(QuestionId::new(99), AnswerValue::Choice("a".into()))
        .unwrap_err();
    assert!(matches!(err, AttemptFlowError::UnknownQuestion(_)));

    let err = ctl
        .update_answer(QuestionId::new(1), AnswerValue::Selection(vec!["a".into()]))
        .unwrap_err();
    assert!(matches!(err, AttemptFlowError::Schema(_)));
}

#[tokio::test]
async fn timer_expiry_forces_a_single_submission() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(Some(1))));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();
    ctl.update_answer(QuestionId::new(1), AnswerValue::Choice("b".into()))
        .unwrap();

    let start = fixed_now();
    let mut expired = 0;
    for i in 1..=70 {
        let event = ctl.tick(start + Duration::seconds(i)).await.unwrap();
        if event == Some(TimerEvent::Expired) {
            expired += 1;
        }
    }

    assert_eq!(expired, 1);
    assert_eq!(ctl.view().unwrap().status, AttemptStatus::Submitted);
    assert_eq!(gateway.submissions().len(), 1);
}

#[tokio::test]
async fn practice_expiry_finalizes_instead_of_submitting() {
    let gateway = Arc::new(FakeQuizGateway::new(
        QuizDefinition::new(
            QUIZ,
            "Timed practice",
            vec![question(1, QuestionKind::Choice)],
            70,
            Some(1),
            QuizMode::Practice,
        )
        .unwrap(),
    ));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();

    let start = fixed_now();
    for i in 1..=60 {
        ctl.tick(start + Duration::seconds(i)).await.unwrap();
    }

    assert_eq!(ctl.view().unwrap().status, AttemptStatus::Finalized);
    assert_eq!(gateway.finalizations().len(), 1);
    assert!(gateway.submissions().is_empty());
}

#[tokio::test]
async fn paused_timer_does_not_count_down() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(Some(1))));
    let mut ctl = controller(gateway, InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();

    ctl.pause_timer().unwrap();
    let start = fixed_now();
    for i in 1..=120 {
        ctl.tick(start + Duration::seconds(i)).await.unwrap();
    }
    let view = ctl.view().unwrap();
    assert_eq!(view.status, AttemptStatus::InProgress);
    assert_eq!(view.time_remaining_seconds, Some(60));

    ctl.resume_timer().unwrap();
    ctl.tick(start + Duration::seconds(121)).await.unwrap();
    assert_eq!(ctl.view().unwrap().time_remaining_seconds, Some(59));
}

#[tokio::test]
async fn draft_survives_reload_and_resume() {
    let drafts = InMemoryRepository::new();
    let mut gateway = FakeQuizGateway::new(exam_quiz(None));
    let attempt = Attempt::started(AttemptId::new(100), QUIZ, USER, fixed_now());
    gateway.script.resumable.push(attempt);
    let gateway = Arc::new(gateway);

    let mut first = AttemptController::new(
        fixed_clock(),
        Arc::clone(&gateway) as Arc<dyn QuizGateway>,
        Arc::new(drafts.clone()),
    );
    first
        .resume_or_start(QUIZ, Some(AttemptId::new(100)))
        .await
        .unwrap();
    first
        .update_answer(QuestionId::new(1), AnswerValue::Choice("b".into()))
        .unwrap();
    first.toggle_flag(QuestionId::new(2));
    first.save_draft(fixed_now() + Duration::seconds(10)).await.unwrap();

    // Fresh controller, same storage: the buffered state comes back.
    let mut second = AttemptController::new(
        fixed_clock(),
        gateway as Arc<dyn QuizGateway>,
        Arc::new(drafts),
    );
    let view = second
        .resume_or_start(QUIZ, Some(AttemptId::new(100)))
        .await
        .unwrap();
    assert!(view.is_resuming);
    assert_eq!(view.answered_count, 1);

    let store = second.store().unwrap();
    assert_eq!(
        store.answer(QuestionId::new(1)),
        Some(&AnswerValue::Choice("b".into()))
    );
    assert!(store.is_flagged(QuestionId::new(2)));
}

#[tokio::test]
async fn submission_deletes_the_draft() {
    let drafts = InMemoryRepository::new();
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let mut ctl = AttemptController::new(
        fixed_clock(),
        gateway as Arc<dyn QuizGateway>,
        Arc::new(drafts.clone()),
    );
    let view = ctl.resume_or_start(QUIZ, None).await.unwrap();
    ctl.update_answer(QuestionId::new(1), AnswerValue::Choice("a".into()))
        .unwrap();
    ctl.save_draft(fixed_now() + Duration::seconds(5)).await.unwrap();

    ctl.submit().await.unwrap();

    use storage::repository::AttemptDraftRepository;
    assert!(
        AttemptDraftRepository::get(&drafts, view.attempt_id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let mut ctl = controller(Arc::clone(&gateway), InMemoryRepository::new());
    ctl.resume_or_start(QUIZ, None).await.unwrap();
    ctl.submit().await.unwrap();

    let view = ctl.finalize().await.unwrap();
    assert_eq!(view.status, AttemptStatus::Finalized);
    let view = ctl.finalize().await.unwrap();
    assert_eq!(view.status, AttemptStatus::Finalized);
    assert_eq!(gateway.finalizations().len(), 1);
}

#[tokio::test]
async fn wired_services_hand_out_working_controllers() {
    let gateway = Arc::new(FakeQuizGateway::new(exam_quiz(None)));
    let services = CourseSessionServices::new(
        fixed_clock(),
        Storage::in_memory(),
        Arc::clone(&gateway) as Arc<dyn QuizGateway>,
        Arc::new(NoProgress),
    );

    let mut ctl = services.attempt_controller();
    let view = ctl.resume_or_start(QUIZ, None).await.unwrap();
    assert_eq!(view.quiz_id, QUIZ);
}
