// src/store/postgres.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, prelude::FromRow, types::Json};

use crate::{
    models::{
        attempt::{Attempt, AttemptStatus, Completion, NewAttempt, QuestionResponse},
        question::{ClassTag, Question, QuestionFilter, QuestionType, parse_letters},
    },
    store::{AttemptStore, QuestionBank, StoreError, StoreResult},
};

const QUESTION_COLUMNS: &str = "id, class_tag, subject, chapter, topics, type, prompt, options, \
     explanation, correct_options, difficulty, marks";

const ATTEMPT_COLUMNS: &str = "id, student_id, class_tag, subjects, requested_chapters, \
     chapters_by_subject, topics, types, question_ids, time_budget_minutes, max_score, status, \
     responses, started_at, ended_at, correct_count, incorrect_count, unattempted_count";

/// Row of the 'questions' table.
#[derive(Debug, FromRow)]
struct QuestionRow {
    id: i64,
    class_tag: String,
    subject: String,
    chapter: String,
    topics: Json<Vec<String>>,
    /// Mapped from the column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    question_type: String,
    prompt: String,
    options: Json<Vec<String>>,
    explanation: String,
    correct_options: Json<Vec<String>>,
    difficulty: String,
    marks: i32,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let malformed = |reason: String| StoreError::Malformed { id, reason };

        let question = Question {
            id,
            class_tag: row.class_tag.parse().map_err(malformed)?,
            subject: row.subject,
            chapter: row.chapter,
            topics: row.topics.0.into_iter().collect(),
            question_type: row.question_type.parse().map_err(malformed)?,
            prompt_text: row.prompt,
            options: row.options.0,
            explanation_text: row.explanation,
            correct_options: parse_letters(&row.correct_options.0).map_err(malformed)?,
            difficulty: row.difficulty.parse().map_err(malformed)?,
            marks: u32::try_from(row.marks).map_err(|e| malformed(e.to_string()))?,
        };
        question.check().map_err(malformed)?;
        Ok(question)
    }
}

/// Question bank backed by the 'questions' table.
#[derive(Debug, Clone)]
pub struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Converts rows, logging and skipping any that break the question invariants.
fn into_questions(rows: Vec<QuestionRow>) -> Vec<Question> {
    rows.into_iter()
        .filter_map(|row| match Question::try_from(row) {
            Ok(question) => Some(question),
            Err(e) => {
                tracing::warn!("Skipping question bank row: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl QuestionBank for PgQuestionBank {
    async fn find(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>> {
        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM questions WHERE class_tag = ",
            QUESTION_COLUMNS
        ));
        query_builder.push_bind(filter.class_tag.as_string());

        if !filter.subjects.is_empty() {
            query_builder.push(" AND subject = ANY(");
            query_builder.push_bind(filter.subjects.clone());
            query_builder.push(")");
        }
        if !filter.chapters.is_empty() {
            query_builder.push(" AND chapter = ANY(");
            query_builder.push_bind(filter.chapters.clone());
            query_builder.push(")");
        }
        if !filter.topics.is_empty() {
            // JSONB "contains any of these strings"
            query_builder.push(" AND topics ?| ");
            query_builder.push_bind(filter.topics.clone());
        }
        if !filter.types.is_empty() {
            let types: Vec<String> = filter.types.iter().map(|t| t.as_str().to_string()).collect();
            query_builder.push(" AND type = ANY(");
            query_builder.push_bind(types);
            query_builder.push(")");
        }

        let rows: Vec<QuestionRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to query question bank: {:?}", e);
                StoreError::Database(e)
            })?;

        Ok(into_questions(rows))
    }

    async fn get_many(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM questions WHERE id = ANY($1)",
            QUESTION_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(into_questions(rows))
    }

    async fn chapters(&self, class_tag: ClassTag, subject: &str) -> StoreResult<Vec<String>> {
        let chapters: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT chapter FROM questions WHERE class_tag = $1 AND subject = $2",
        )
        .bind(class_tag.as_string())
        .bind(subject)
        .fetch_all(&self.pool)
        .await?;

        Ok(chapters.into_iter().map(|(c,)| c).collect())
    }
}

/// Row of the 'quiz_attempts' table.
#[derive(Debug, FromRow)]
struct AttemptRow {
    id: i64,
    student_id: String,
    class_tag: String,
    subjects: Json<Vec<String>>,
    requested_chapters: Json<Vec<String>>,
    chapters_by_subject: Json<BTreeMap<String, Vec<String>>>,
    topics: Json<Vec<String>>,
    types: Json<Vec<QuestionType>>,
    question_ids: Json<Vec<i64>>,
    time_budget_minutes: f64,
    max_score: i32,
    status: String,
    responses: Json<Vec<QuestionResponse>>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    correct_count: i32,
    incorrect_count: i32,
    unattempted_count: i32,
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let class_tag: ClassTag = row
            .class_tag
            .parse()
            .map_err(|reason| StoreError::Malformed { id, reason })?;
        let status = AttemptStatus::parse(&row.status).ok_or_else(|| StoreError::Malformed {
            id,
            reason: format!("unknown status '{}'", row.status),
        })?;

        Ok(Attempt {
            id,
            student_id: row.student_id,
            class_tag,
            subjects: row.subjects.0,
            requested_chapters: row.requested_chapters.0,
            chapters_by_subject: row.chapters_by_subject.0,
            topics: row.topics.0,
            types: row.types.0,
            question_ids: row.question_ids.0,
            time_budget_minutes: row.time_budget_minutes,
            max_score: non_negative(row.max_score),
            status,
            responses: row.responses.0,
            started_at: row.started_at,
            ended_at: row.ended_at,
            correct_count: non_negative(row.correct_count),
            incorrect_count: non_negative(row.incorrect_count),
            unattempted_count: non_negative(row.unattempted_count),
        })
    }
}

/// Attempt store backed by the 'quiz_attempts' table.
#[derive(Debug, Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn insert(&self, attempt: NewAttempt) -> StoreResult<Attempt> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO quiz_attempts (
                student_id, class_tag, subjects, requested_chapters, chapters_by_subject,
                topics, types, question_ids, time_budget_minutes, max_score, status,
                responses, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&attempt.student_id)
        .bind(attempt.class_tag.as_string())
        .bind(Json(&attempt.subjects))
        .bind(Json(&attempt.requested_chapters))
        .bind(Json(&attempt.chapters_by_subject))
        .bind(Json(&attempt.topics))
        .bind(Json(&attempt.types))
        .bind(Json(&attempt.question_ids))
        .bind(attempt.time_budget_minutes)
        .bind(i32::try_from(attempt.max_score).unwrap_or(i32::MAX))
        .bind(AttemptStatus::InProgress.as_str())
        .bind(Json(&attempt.responses))
        .bind(attempt.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert quiz attempt: {:?}", e);
            StoreError::Database(e)
        })?;

        Ok(attempt.into_attempt(id))
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Attempt>> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn list_by_student(&self, student_id: &str) -> StoreResult<Vec<Attempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {} FROM quiz_attempts WHERE student_id = $1 ORDER BY started_at DESC, id DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn complete(&self, id: i64, completion: &Completion) -> StoreResult<bool> {
        // The status guard in the WHERE clause makes this a compare-and-swap.
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts SET
                status = $2,
                responses = $3,
                ended_at = $4,
                correct_count = $5,
                incorrect_count = $6,
                unattempted_count = $7
            WHERE id = $1 AND status = $8
            "#,
        )
        .bind(id)
        .bind(AttemptStatus::Completed.as_str())
        .bind(Json(&completion.responses))
        .bind(completion.ended_at)
        .bind(i32::try_from(completion.correct_count).unwrap_or(i32::MAX))
        .bind(i32::try_from(completion.incorrect_count).unwrap_or(i32::MAX))
        .bind(i32::try_from(completion.unattempted_count).unwrap_or(i32::MAX))
        .bind(AttemptStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to complete quiz attempt {}: {:?}", id, e);
            StoreError::Database(e)
        })?;

        Ok(result.rows_affected() == 1)
    }
}
