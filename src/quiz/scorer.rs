// src/quiz/scorer.rs

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        attempt::{Attempt, AttemptStatus, Completion, QuestionResponse},
        question::Question,
    },
    quiz::error::{QuizError, QuizResult},
    store::{AttemptStore, QuestionBank},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unattempted,
}

/// Counts returned to the client after a submission.
/// `score` sums the marks of correct questions; the raw counts are the
/// primary result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub score: u32,
    pub max_score: u32,
}

impl ScoreSummary {
    fn record(&mut self, verdict: Verdict, marks: u32) {
        match verdict {
            Verdict::Correct => {
                self.correct += 1;
                self.score += marks;
            }
            Verdict::Incorrect => self.incorrect += 1,
            Verdict::Unattempted => self.unattempted += 1,
        }
    }
}

/// Compares the selected options with the answer key as sets.
/// An empty selection counts as unattempted.
pub fn classify(question: &Question, response: Option<&QuestionResponse>) -> Verdict {
    match response {
        None => Verdict::Unattempted,
        Some(r) if r.selected_options.is_empty() => Verdict::Unattempted,
        Some(r) if r.selected_options == question.correct_options => Verdict::Correct,
        Some(_) => Verdict::Incorrect,
    }
}

/// Scores the attempt's questions in order. Responses are matched by
/// question id; the first response for an id wins, and responses for
/// questions outside the attempt are ignored.
pub fn score_attempt(
    question_ids: &[i64],
    questions: &HashMap<i64, Question>,
    responses: &[QuestionResponse],
) -> ScoreSummary {
    let mut by_question: HashMap<i64, &QuestionResponse> = HashMap::new();
    for r in responses {
        by_question.entry(r.question_id).or_insert(r);
    }

    let mut summary = ScoreSummary::default();
    for id in question_ids {
        match questions.get(id) {
            Some(question) => {
                let verdict = classify(question, by_question.get(id).copied());
                summary.record(verdict, question.marks);
            }
            None => {
                // Removed from the bank after allocation; cannot be graded.
                tracing::warn!("Question {} no longer in the bank, counting as unattempted", id);
                summary.record(Verdict::Unattempted, 0);
            }
        }
    }
    summary
}

/// Read path: loads an attempt without touching its state.
pub async fn load_attempt(store: &dyn AttemptStore, attempt_id: i64) -> QuizResult<Attempt> {
    store
        .get(attempt_id)
        .await?
        .ok_or(QuizError::AttemptNotFound(attempt_id))
}

/// Scores a submission and completes the attempt.
///
/// * Unknown attempt: `AttemptNotFound`.
/// * Attempt already completed, or completed concurrently by another
///   submission: `AlreadyCompleted`, leaving the first result untouched.
/// * Otherwise the responses are stored verbatim along with the counts.
pub async fn submit(
    bank: &dyn QuestionBank,
    store: &dyn AttemptStore,
    attempt_id: i64,
    responses: Vec<QuestionResponse>,
) -> QuizResult<ScoreSummary> {
    let attempt = load_attempt(store, attempt_id).await?;
    if attempt.status == AttemptStatus::Completed {
        tracing::warn!("Rejected re-submission of attempt {}", attempt_id);
        return Err(QuizError::AlreadyCompleted(attempt_id));
    }

    let questions: HashMap<i64, Question> = bank
        .get_many(&attempt.question_ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();

    let mut summary = score_attempt(&attempt.question_ids, &questions, &responses);
    summary.max_score = attempt.max_score;

    let completion = Completion {
        responses,
        correct_count: summary.correct,
        incorrect_count: summary.incorrect,
        unattempted_count: summary.unattempted,
        ended_at: Utc::now(),
    };

    if !store.complete(attempt_id, &completion).await? {
        tracing::warn!("Attempt {} was completed by a concurrent submission", attempt_id);
        return Err(QuizError::AlreadyCompleted(attempt_id));
    }

    tracing::info!(
        "Attempt {} completed: {} correct, {} incorrect, {} unattempted",
        attempt_id,
        summary.correct,
        summary.incorrect,
        summary.unattempted
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{
            attempt::NewAttempt,
            question::{ClassTag, OptionLetter, QuestionFilter, QuestionType, fixtures::question},
        },
        store::{
            StoreResult,
            memory::{InMemoryAttemptStore, InMemoryQuestionBank},
        },
    };

    use crate::models::question::OptionLetter::{A, B, C};

    fn multi_select(id: i64) -> Question {
        let mut q = question(id, "Chemistry", "Bonding");
        q.question_type = QuestionType::MultiSelect;
        q.correct_options = BTreeSet::from([A, C]);
        q
    }

    fn answer(question_id: i64, letters: &[OptionLetter]) -> QuestionResponse {
        QuestionResponse {
            question_id,
            selected_options: letters.iter().copied().collect(),
            time_spent_seconds: 10.0,
            marked_for_review: false,
        }
    }

    #[test]
    fn multi_select_requires_exact_set() {
        let q = multi_select(1);

        assert_eq!(classify(&q, Some(&answer(1, &[C, A]))), Verdict::Correct);
        assert_eq!(classify(&q, Some(&answer(1, &[A]))), Verdict::Incorrect);
        assert_eq!(classify(&q, Some(&answer(1, &[A, B, C]))), Verdict::Incorrect);
        assert_eq!(classify(&q, None), Verdict::Unattempted);
        assert_eq!(classify(&q, Some(&answer(1, &[]))), Verdict::Unattempted);
    }

    #[test]
    fn score_counts_each_question_once_in_attempt_order() {
        let questions: HashMap<i64, Question> =
            [question(1, "Physics", "1"), multi_select(2), question(3, "Physics", "1")]
                .into_iter()
                .map(|q| (q.id, q))
                .collect();
        let responses = vec![
            answer(1, &[A]),
            answer(1, &[B]),
            answer(2, &[A]),
            answer(99, &[A]),
        ];

        let summary = score_attempt(&[1, 2, 3], &questions, &responses);
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.incorrect, 1);
        assert_eq!(summary.unattempted, 1);
        assert_eq!(summary.score, 4);
    }

    #[test]
    fn missing_bank_question_is_unattempted() {
        let questions = HashMap::new();
        let summary = score_attempt(&[5], &questions, &[answer(5, &[A])]);
        assert_eq!(summary.unattempted, 1);
        assert_eq!(summary.correct + summary.incorrect, 0);
    }

    async fn seeded() -> (InMemoryQuestionBank, InMemoryAttemptStore, i64) {
        let bank =
            InMemoryQuestionBank::new(vec![question(1, "Physics", "1"), multi_select(2)]).unwrap();
        let store = InMemoryAttemptStore::new();
        let attempt = store
            .insert(NewAttempt {
                student_id: "s1".to_string(),
                class_tag: ClassTag::Neet,
                subjects: vec!["Chemistry".to_string(), "Physics".to_string()],
                requested_chapters: vec![],
                chapters_by_subject: BTreeMap::new(),
                topics: vec![],
                types: vec![],
                question_ids: vec![1, 2],
                time_budget_minutes: 6.0,
                max_score: 8,
                responses: vec![QuestionResponse::blank(1), QuestionResponse::blank(2)],
                started_at: Utc::now(),
            })
            .await
            .unwrap();
        (bank, store, attempt.id)
    }

    #[tokio::test]
    async fn submit_completes_attempt_and_stores_responses() {
        let (bank, store, id) = seeded().await;
        let responses = vec![answer(1, &[A]), answer(2, &[C])];

        let summary = submit(&bank, &store, id, responses.clone()).await.unwrap();
        assert_eq!(
            summary,
            ScoreSummary { correct: 1, incorrect: 1, unattempted: 0, score: 4, max_score: 8 }
        );

        let stored = load_attempt(&store, id).await.unwrap();
        assert_eq!(stored.status, AttemptStatus::Completed);
        assert_eq!(stored.responses, responses);
        assert_eq!(stored.correct_count, 1);
        assert_eq!(stored.incorrect_count, 1);
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test]
    async fn second_submission_is_rejected_and_keeps_first_result() {
        let (bank, store, id) = seeded().await;

        submit(&bank, &store, id, vec![answer(1, &[A])]).await.unwrap();
        let again = submit(&bank, &store, id, vec![answer(1, &[A]), answer(2, &[A, C])]).await;
        assert!(matches!(again, Err(QuizError::AlreadyCompleted(i)) if i == id));

        let stored = load_attempt(&store, id).await.unwrap();
        assert_eq!(stored.correct_count, 1);
        assert_eq!(stored.unattempted_count, 1);
    }

    /// Yields before answering so two submissions both get past the status
    /// check before either one completes the attempt.
    struct YieldingBank(InMemoryQuestionBank);

    #[async_trait]
    impl QuestionBank for YieldingBank {
        async fn find(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>> {
            self.0.find(filter).await
        }

        async fn get_many(&self, ids: &[i64]) -> StoreResult<Vec<Question>> {
            tokio::task::yield_now().await;
            self.0.get_many(ids).await
        }

        async fn chapters(&self, class_tag: ClassTag, subject: &str) -> StoreResult<Vec<String>> {
            self.0.chapters(class_tag, subject).await
        }
    }

    #[tokio::test]
    async fn concurrent_submissions_complete_exactly_once() {
        let (bank, store, id) = seeded().await;
        let bank = YieldingBank(bank);

        let (first, second) = tokio::join!(
            submit(&bank, &store, id, vec![answer(1, &[A])]),
            submit(&bank, &store, id, vec![answer(1, &[B]), answer(2, &[A, C])]),
        );

        let winner = match (first, second) {
            (Ok(summary), Err(QuizError::AlreadyCompleted(i))) if i == id => summary,
            (Err(QuizError::AlreadyCompleted(i)), Ok(summary)) if i == id => summary,
            other => panic!("expected exactly one winner, got {:?}", other),
        };

        let stored = load_attempt(&store, id).await.unwrap();
        assert_eq!(stored.status, AttemptStatus::Completed);
        assert_eq!(stored.correct_count, winner.correct);
        assert_eq!(stored.incorrect_count, winner.incorrect);
        assert_eq!(stored.unattempted_count, winner.unattempted);
    }

    #[tokio::test]
    async fn unknown_attempt_is_not_found() {
        let (bank, store, _) = seeded().await;
        let result = submit(&bank, &store, 404, vec![]).await;
        assert!(matches!(result, Err(QuizError::AttemptNotFound(404))));
    }

    #[tokio::test]
    async fn reading_never_changes_status() {
        let (_, store, id) = seeded().await;
        for _ in 0..3 {
            let attempt = load_attempt(&store, id).await.unwrap();
            assert_eq!(attempt.status, AttemptStatus::InProgress);
        }
    }
}
