mod answer;
mod attempt;
mod ids;
mod progress;
mod quiz;

pub use answer::{
    AnswerSchemaError, AnswerValue, AnswerWarning, SHORT_TEXT_THRESHOLD, validate_answer,
};
pub use attempt::{Attempt, AttemptError, AttemptStatus};
pub use ids::{AttemptId, CourseId, LectureId, ParseIdError, QuestionId, QuizId, UserId};
pub use progress::{
    COMPLETION_THRESHOLD_PERCENT, CourseProgressSnapshot, CourseTotals, LectureProgressRecord,
};
pub use quiz::{Question, QuestionKind, QuizDefinition, QuizError, QuizMode};
