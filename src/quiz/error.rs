// src/quiz/error.rs

use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the allocator and the scorer.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("No questions available for the requested scope")]
    NoQuestionsAvailable,

    #[error("Quiz attempt {0} not found")]
    AttemptNotFound(i64),

    #[error("Quiz attempt {0} has already been submitted")]
    AlreadyCompleted(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type QuizResult<T> = Result<T, QuizError>;
