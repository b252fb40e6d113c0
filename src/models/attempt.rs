// src/models/attempt.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{ClassTag, OptionLetter, Question, QuestionType, parse_letters};

/// Lifecycle of an attempt. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(AttemptStatus::InProgress),
            "completed" => Some(AttemptStatus::Completed),
            _ => None,
        }
    }
}

/// A student's answer to one question of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    #[serde(rename = "question")]
    pub question_id: i64,
    pub selected_options: BTreeSet<OptionLetter>,
    pub time_spent_seconds: f64,
    #[serde(default)]
    pub marked_for_review: bool,
}

impl QuestionResponse {
    pub fn blank(question_id: i64) -> Self {
        Self {
            question_id,
            selected_options: BTreeSet::new(),
            time_spent_seconds: 0.0,
            marked_for_review: false,
        }
    }
}

/// Everything needed to persist a freshly allocated attempt.
/// The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub student_id: String,
    pub class_tag: ClassTag,
    pub subjects: Vec<String>,
    pub requested_chapters: Vec<String>,
    pub chapters_by_subject: BTreeMap<String, Vec<String>>,
    pub topics: Vec<String>,
    pub types: Vec<QuestionType>,
    pub question_ids: Vec<i64>,
    pub time_budget_minutes: f64,
    pub max_score: u32,
    pub responses: Vec<QuestionResponse>,
    pub started_at: DateTime<Utc>,
}

impl NewAttempt {
    pub fn into_attempt(self, id: i64) -> Attempt {
        Attempt {
            id,
            student_id: self.student_id,
            class_tag: self.class_tag,
            subjects: self.subjects,
            requested_chapters: self.requested_chapters,
            chapters_by_subject: self.chapters_by_subject,
            topics: self.topics,
            types: self.types,
            question_ids: self.question_ids,
            time_budget_minutes: self.time_budget_minutes,
            max_score: self.max_score,
            status: AttemptStatus::InProgress,
            responses: self.responses,
            started_at: self.started_at,
            ended_at: None,
            correct_count: 0,
            incorrect_count: 0,
            unattempted_count: 0,
        }
    }
}

/// A persisted quiz attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub student_id: String,
    #[serde(rename = "class")]
    pub class_tag: ClassTag,
    /// Subjects of the questions actually selected.
    pub subjects: Vec<String>,
    pub requested_chapters: Vec<String>,
    pub chapters_by_subject: BTreeMap<String, Vec<String>>,
    pub topics: Vec<String>,
    pub types: Vec<QuestionType>,
    /// Fixed at creation; defines question order for the whole attempt.
    pub question_ids: Vec<i64>,
    pub time_budget_minutes: f64,
    pub max_score: u32,
    pub status: AttemptStatus,
    pub responses: Vec<QuestionResponse>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unattempted_count: u32,
}

/// Result of scoring written back when an attempt completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub responses: Vec<QuestionResponse>,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unattempted_count: u32,
    pub ended_at: DateTime<Utc>,
}

/// DTO for requesting a new attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttemptRequest {
    #[validate(custom(function = validate_class))]
    pub class: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    /// Time budget in minutes.
    #[validate(range(
        exclusive_min = 0.0,
        max = 600.0,
        message = "Time budget must be positive and at most 600 minutes."
    ))]
    pub time: f64,
    #[validate(length(min = 1, max = 64, message = "Student id must be between 1 and 64 characters."))]
    pub student_id: String,
}

fn validate_class(class: &str) -> Result<(), validator::ValidationError> {
    class
        .parse::<ClassTag>()
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("unknown_class"))
}

/// DTO returned after an attempt has been allocated.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttemptResponse {
    pub quiz_id: i64,
    pub questions: Vec<Question>,
    pub subjects: Vec<String>,
    pub chapters_by_subject: BTreeMap<String, Vec<String>>,
}

/// `selectedOption` arrives either as one letter or a list of letters.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SelectedOption {
    One(String),
    Many(Vec<String>),
}

impl SelectedOption {
    pub fn into_letters(self) -> Result<BTreeSet<OptionLetter>, String> {
        match self {
            SelectedOption::One(letter) => parse_letters(&[letter]),
            SelectedOption::Many(letters) => parse_letters(&letters),
        }
    }
}

/// One entry of a submission as sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    pub question: i64,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
    #[serde(default)]
    pub time_spent: f64,
    #[serde(default)]
    pub marked_for_review: bool,
}

impl SubmittedResponse {
    /// Normalizes the wire shape into a stored response.
    pub fn normalize(self) -> Result<QuestionResponse, String> {
        let selected_options = match self.selected_option {
            Some(selected) => selected.into_letters()?,
            None => BTreeSet::new(),
        };
        Ok(QuestionResponse {
            question_id: self.question,
            selected_options,
            time_spent_seconds: self.time_spent.max(0.0),
            marked_for_review: self.marked_for_review,
        })
    }
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub responses: Vec<SubmittedResponse>,
}

/// Query parameters for listing a student's attempts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAttemptsParams {
    pub student_id: String,
}

/// Compact view of an attempt used by the listing endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub quiz_id: i64,
    pub status: AttemptStatus,
    pub subjects: Vec<String>,
    pub question_count: usize,
    pub max_score: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&Attempt> for AttemptSummary {
    fn from(a: &Attempt) -> Self {
        Self {
            quiz_id: a.id,
            status: a.status,
            subjects: a.subjects.clone(),
            question_count: a.question_ids.len(),
            max_score: a.max_score,
            correct: a.correct_count,
            incorrect: a.incorrect_count,
            unattempted: a.unattempted_count,
            started_at: a.started_at,
            ended_at: a.ended_at,
        }
    }
}
