#![forbid(unsafe_code)]

pub mod answer_store;
pub mod attempt_controller;
pub mod course_services;
pub mod error;
pub mod gateway;
pub mod http_gateway;
pub mod progress_cache;
pub mod reconciler;

pub use course_core::Clock;

pub use answer_store::{AnswerStore, AnswerStoreError, AutosavePolicy};
pub use attempt_controller::{AttemptController, AttemptView};
pub use course_services::CourseSessionServices;
pub use error::{AttemptFlowError, ProgressError};
pub use gateway::{
    AnswerFeedback, GatewayError, LectureUpdate, MergedProgress, ProgressGateway, QuizBundle,
    QuizGateway, SubmittedAnswer,
};
pub use http_gateway::{GatewayConfig, HttpGateway};
pub use progress_cache::ProgressCache;
pub use reconciler::{ProgressReconciler, ReconcileOutcome};
