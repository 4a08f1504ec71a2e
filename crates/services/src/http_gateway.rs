use std::env;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use course_core::model::{
    AnswerValue, Attempt, AttemptId, CourseId, LectureId, LectureProgressRecord, QuestionId,
    QuizId,
};

use crate::gateway::{
    AnswerFeedback, GatewayError, LectureUpdate, MergedProgress, ProgressGateway, QuizBundle,
    QuizGateway, SubmittedAnswer,
};

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: String,
}

impl GatewayConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_token = env::var("COURSE_API_TOKEN").ok()?;
        if api_token.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("COURSE_API_BASE_URL").unwrap_or_else(|_| "https://api.example.com/v1".into());
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// Reqwest-backed implementation of both remote contracts.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Map non-success statuses into the taxonomy before touching the body.
    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::CONFLICT => {
                let body: ConflictBody = response.json().await.unwrap_or_default();
                Err(GatewayError::Conflict {
                    active_attempt_id: body.active_attempt_id.map(AttemptId::new),
                })
            }
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                let message = response.text().await.unwrap_or_default();
                Err(GatewayError::Rejected(message))
            }
            other => Err(GatewayError::HttpStatus(other)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConflictBody {
    active_attempt_id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SubmitAttemptRequest<'a> {
    answers: &'a [SubmittedAnswer],
}

#[derive(Debug, Serialize)]
struct MergeProgressRequest<'a> {
    records: &'a [LectureProgressRecord],
}

#[async_trait]
impl QuizGateway for HttpGateway {
    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<QuizBundle, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("quizzes/{quiz_id}")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_attempt(&self, quiz_id: QuizId) -> Result<Attempt, GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("quizzes/{quiz_id}/attempts")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn resume_attempt(&self, attempt_id: AttemptId) -> Result<Attempt, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("attempts/{attempt_id}")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn submit_question_answer(
        &self,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        question_id: QuestionId,
        answer: &AnswerValue,
    ) -> Result<AnswerFeedback, GatewayError> {
        let response = self
            .client
            .post(self.url(&format!(
                "quizzes/{quiz_id}/attempts/{attempt_id}/answers/{question_id}"
            )))
            .bearer_auth(&self.config.api_token)
            .json(answer)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn submit_attempt(
        &self,
        quiz_id: QuizId,
        attempt_id: AttemptId,
        answers: &[SubmittedAnswer],
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("quizzes/{quiz_id}/attempts/{attempt_id}/submit")))
            .bearer_auth(&self.config.api_token)
            .json(&SubmitAttemptRequest { answers })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn finalize_attempt(
        &self,
        quiz_id: QuizId,
        attempt_id: AttemptId,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!(
                "quizzes/{quiz_id}/attempts/{attempt_id}/finalize"
            )))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressGateway for HttpGateway {
    async fn merge_progress(
        &self,
        course_id: CourseId,
        local: &[LectureProgressRecord],
    ) -> Result<MergedProgress, GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("courses/{course_id}/progress/merge")))
            .bearer_auth(&self.config.api_token)
            .json(&MergeProgressRequest { records: local })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_lecture_progress(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
        data: &LectureProgressRecord,
    ) -> Result<LectureUpdate, GatewayError> {
        let response = self
            .client
            .put(self.url(&format!(
                "courses/{course_id}/lectures/{lecture_id}/progress"
            )))
            .bearer_auth(&self.config.api_token)
            .json(data)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
