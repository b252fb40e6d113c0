// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{
            AttemptSummary, CreateAttemptRequest, CreateAttemptResponse, ListAttemptsParams,
            QuestionResponse, SubmitAttemptRequest,
        },
        question::{ClassTag, QuestionType},
    },
    quiz::{self, AllocationRequest, ChapterWeights, allocator::compare_chapters},
    state::AppState,
    store::{AttemptStore, QuestionBank},
};

/// Allocates a new quiz attempt.
///
/// * Sizes the quiz from the time budget (one question per three minutes).
/// * Splits it over chapters (weighted or uniform) and samples the bank.
/// * Persists the attempt and returns its questions in order.
pub async fn create_attempt(
    State(state): State<AppState>,
    Json(req): Json<CreateAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let class_tag: ClassTag = req.class.parse().map_err(AppError::BadRequest)?;
    let types = req
        .types
        .iter()
        .map(|t| t.parse::<QuestionType>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::BadRequest)?;

    let request = AllocationRequest {
        class_tag,
        subjects: req.subjects,
        chapters: req.chapters,
        topics: req.topics,
        types,
        time_budget_minutes: req.time,
        student_id: req.student_id,
    };

    let mut rng = StdRng::from_entropy();
    let allocation = quiz::allocate(
        state.questions.as_ref(),
        state.attempts.as_ref(),
        state.weights.as_ref(),
        &request,
        &mut rng,
    )
    .await?;

    let attempt = allocation.attempt;
    Ok((
        StatusCode::CREATED,
        Json(CreateAttemptResponse {
            quiz_id: attempt.id,
            questions: allocation.questions,
            subjects: attempt.subjects,
            chapters_by_subject: attempt.chapters_by_subject,
        }),
    ))
}

/// Scores a submission and completes the attempt.
/// A second submission for the same attempt is rejected with 409.
pub async fn submit_attempt(
    State(bank): State<Arc<dyn QuestionBank>>,
    State(attempts): State<Arc<dyn AttemptStore>>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let responses = req
        .responses
        .into_iter()
        .map(|r| r.normalize())
        .collect::<Result<Vec<QuestionResponse>, _>>()
        .map_err(AppError::BadRequest)?;

    let summary = quiz::submit(bank.as_ref(), attempts.as_ref(), quiz_id, responses).await?;

    Ok(Json(summary))
}

/// Retrieves a single attempt by ID. Read-only.
pub async fn get_attempt(
    State(attempts): State<Arc<dyn AttemptStore>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = quiz::load_attempt(attempts.as_ref(), quiz_id).await?;
    Ok(Json(attempt))
}

/// Lists a student's attempts, newest first.
pub async fn list_attempts(
    State(attempts): State<Arc<dyn AttemptStore>>,
    Query(params): Query<ListAttemptsParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.student_id.trim().is_empty() {
        return Err(AppError::BadRequest("studentId is required".to_string()));
    }

    let summaries: Vec<AttemptSummary> = attempts
        .list_by_student(params.student_id.trim())
        .await?
        .iter()
        .map(AttemptSummary::from)
        .collect();

    Ok(Json(summaries))
}

/// Query parameters for the chapter listing.
#[derive(Debug, Deserialize)]
pub struct ChapterParams {
    pub class: String,
    pub subject: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub chapter: String,
    /// Configured weight, if the subject is weighted.
    pub weight: Option<u32>,
}

/// Lists the chapters a class and subject offer, with their weights.
pub async fn list_chapters(
    State(bank): State<Arc<dyn QuestionBank>>,
    State(weights): State<Arc<dyn ChapterWeights>>,
    Query(params): Query<ChapterParams>,
) -> Result<impl IntoResponse, AppError> {
    let class_tag: ClassTag = params.class.parse().map_err(AppError::BadRequest)?;
    let subject = params.subject.trim();

    let mut chapters = bank.chapters(class_tag, subject).await?;
    chapters.sort_by(|a, b| compare_chapters(a, b));

    let table = weights.weights_for(class_tag, subject);
    let listing: Vec<ChapterInfo> = chapters
        .into_iter()
        .map(|chapter| ChapterInfo {
            weight: table.and_then(|t| t.get(&chapter).copied()),
            chapter,
        })
        .collect();

    Ok(Json(listing))
}
