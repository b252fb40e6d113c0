// src/store/mod.rs

//! Collaborators of the quiz engine: the read-only question bank and the
//! attempt store. Postgres backs both in production; the in-memory versions
//! serve tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    attempt::{Attempt, Completion, NewAttempt},
    question::{ClassTag, Question, QuestionFilter},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed record {id}: {reason}")]
    Malformed { id: i64, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to the question bank.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Returns every question matching the filter, in no particular order.
    async fn find(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>>;

    /// Loads the given questions. Unknown ids are skipped.
    async fn get_many(&self, ids: &[i64]) -> StoreResult<Vec<Question>>;

    /// Distinct chapters available for a class and subject.
    async fn chapters(&self, class_tag: ClassTag, subject: &str) -> StoreResult<Vec<String>>;
}

/// Durable storage for attempts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert(&self, attempt: NewAttempt) -> StoreResult<Attempt>;

    async fn get(&self, id: i64) -> StoreResult<Option<Attempt>>;

    /// Attempts of one student, newest first.
    async fn list_by_student(&self, student_id: &str) -> StoreResult<Vec<Attempt>>;

    /// Moves an attempt from in-progress to completed in one atomic step.
    /// Returns `false` when the attempt is missing or no longer in progress.
    async fn complete(&self, id: i64, completion: &Completion) -> StoreResult<bool>;
}
