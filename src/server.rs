//! HTTP surface for question generation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedder::Embedder;
use crate::error::GenerationError;
use crate::questions::{GeneratedQuestions, InterviewCoach, QuestionModel};
use crate::vector_store::VectorIndex;

const JOB_DESCRIPTION_REQUIRED: &str = "Job description is required";
const GENERATION_FAILED: &str = "Failed to generate questions";

/// Anything that turns a job description into grounded questions.
#[async_trait]
pub trait QuestionService: Send + Sync {
    /// Generates questions for one job description.
    async fn generate(&self, job_description: &str) -> Result<GeneratedQuestions, GenerationError>;
}

#[async_trait]
impl<E, S, M> QuestionService for InterviewCoach<E, S, M>
where
    E: Embedder,
    S: VectorIndex,
    M: QuestionModel,
{
    async fn generate(&self, job_description: &str) -> Result<GeneratedQuestions, GenerationError> {
        InterviewCoach::generate(self, job_description).await
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    generator: Result<Arc<dyn QuestionService>, Arc<str>>,
    anthropic_key_set: bool,
}

impl AppState {
    /// Question generation is wired up.
    pub fn ready(generator: Arc<dyn QuestionService>) -> Self {
        Self {
            generator: Ok(generator),
            anthropic_key_set: true,
        }
    }

    /// Generation could not be configured; every request to it answers 500.
    pub fn unavailable(reason: impl Into<String>, anthropic_key_set: bool) -> Self {
        Self {
            generator: Err(Arc::from(reason.into())),
            anthropic_key_set,
        }
    }
}

/// Routes `GET /api/health` and `POST /api/generate-questions`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generate-questions", post(generate_questions))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    job_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    questions: Vec<String>,
    relevant_experiences: Vec<ExperienceRef>,
}

#[derive(Debug, Serialize)]
struct ExperienceRef {
    role: String,
    company: String,
    score: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    anthropic_key_set: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        anthropic_key_set: state.anthropic_key_set,
        message: if state.anthropic_key_set {
            "API key is set"
        } else {
            "ANTHROPIC_API_KEY is missing"
        },
    })
}

async fn generate_questions(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorBody>)> {
    let request = body.map_err(|rejection| {
        debug!(%rejection, "unreadable request body");
        failure(StatusCode::BAD_REQUEST, JOB_DESCRIPTION_REQUIRED)
    })?;
    let job_description = request
        .0
        .job_description
        .filter(|jd| !jd.trim().is_empty())
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, JOB_DESCRIPTION_REQUIRED))?;
    let generator = state.generator.as_ref().map_err(|reason| {
        error!(%reason, "question generation is not configured");
        failure(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED)
    })?;

    info!(chars = job_description.len(), "generating questions");
    let generated = generator
        .generate(job_description.trim())
        .await
        .map_err(|err| {
            error!(error = %err, "question generation failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED)
        })?;

    Ok(Json(GenerateResponse {
        questions: generated.questions,
        relevant_experiences: generated
            .experiences
            .into_iter()
            .map(|exp| ExperienceRef {
                role: exp.role,
                company: exp.company,
                score: exp.score,
            })
            .collect(),
    }))
}

fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}
