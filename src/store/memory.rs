// src/store/memory.rs

use std::{
    collections::{BTreeSet, HashMap},
    sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    models::{
        attempt::{Attempt, AttemptStatus, Completion, NewAttempt},
        question::{ClassTag, Question, QuestionFilter},
    },
    store::{AttemptStore, QuestionBank, StoreError, StoreResult},
};

/// Question bank held in memory.
#[derive(Debug, Default)]
pub struct InMemoryQuestionBank {
    questions: RwLock<Vec<Question>>,
}

impl InMemoryQuestionBank {
    /// Builds a bank from pre-validated questions.
    pub fn new(questions: Vec<Question>) -> Result<Self, StoreError> {
        for q in &questions {
            q.check().map_err(|reason| StoreError::Malformed { id: q.id, reason })?;
        }
        Ok(Self {
            questions: RwLock::new(questions),
        })
    }

    pub async fn insert(&self, question: Question) -> StoreResult<()> {
        question.check().map_err(|reason| StoreError::Malformed {
            id: question.id,
            reason,
        })?;
        self.questions.write().await.push(question);
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn find(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>> {
        let questions = self.questions.read().await;
        Ok(questions.iter().filter(|q| filter.matches(q)).cloned().collect())
    }

    async fn get_many(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        let questions = self.questions.read().await;
        Ok(questions.iter().filter(|q| wanted.contains(&q.id)).cloned().collect())
    }

    async fn chapters(&self, class_tag: ClassTag, subject: &str) -> StoreResult<Vec<String>> {
        let questions = self.questions.read().await;
        let chapters: BTreeSet<String> = questions
            .iter()
            .filter(|q| q.class_tag == class_tag && q.subject == subject)
            .map(|q| q.chapter.clone())
            .collect();
        Ok(chapters.into_iter().collect())
    }
}

/// Attempt store held in memory. Ids start at 1.
#[derive(Debug)]
pub struct InMemoryAttemptStore {
    next_id: AtomicI64,
    attempts: RwLock<HashMap<i64, Attempt>>,
}

impl Default for InMemoryAttemptStore {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            attempts: RwLock::new(HashMap::new()),
        }
    }
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.attempts.read().await.is_empty()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn insert(&self, attempt: NewAttempt) -> StoreResult<Attempt> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let attempt = attempt.into_attempt(id);
        self.attempts.write().await.insert(id, attempt.clone());
        Ok(attempt)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Attempt>> {
        Ok(self.attempts.read().await.get(&id).cloned())
    }

    async fn list_by_student(&self, student_id: &str) -> StoreResult<Vec<Attempt>> {
        let attempts = self.attempts.read().await;
        let mut found: Vec<Attempt> = attempts
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn complete(&self, id: i64, completion: &Completion) -> StoreResult<bool> {
        // Check and write under one lock so only the first submission wins.
        let mut attempts = self.attempts.write().await;
        let Some(attempt) = attempts.get_mut(&id) else {
            return Ok(false);
        };
        if attempt.status != AttemptStatus::InProgress {
            return Ok(false);
        }
        attempt.status = AttemptStatus::Completed;
        attempt.responses = completion.responses.clone();
        attempt.correct_count = completion.correct_count;
        attempt.incorrect_count = completion.incorrect_count;
        attempt.unattempted_count = completion.unattempted_count;
        attempt.ended_at = Some(completion.ended_at);
        Ok(true)
    }
}
