// src/quiz/allocator.rs

//! Sizes a quiz from its time budget, splits the count into per-chapter
//! quotas and samples questions without replacement.
//!
//! Quotas come from one of two mutually exclusive paths:
//!
//! * **weighted**: the request names exactly one subject and the weight table
//!   has an entry for it. Each weighted chapter gets `floor(w / total * n)`
//!   questions; the leftover units go to chapters drawn with probability
//!   proportional to their fractional part, each chapter at most once.
//! * **uniform**: `n / N` per chapter, with `n mod N` distinct chapters picked
//!   at random for one extra question.
//!
//! Whatever the chapters cannot supply is backfilled from the rest of the
//! candidate pool. Falling short of the target is accepted.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashSet},
};

use chrono::Utc;
use rand::{Rng, seq::SliceRandom, seq::index};

use crate::{
    config::{MAX_QUESTIONS_PER_ATTEMPT, MINUTES_PER_QUESTION},
    models::{
        attempt::{Attempt, NewAttempt, QuestionResponse},
        question::{ClassTag, Question, QuestionFilter, QuestionType},
    },
    quiz::{
        error::{QuizError, QuizResult},
        weights::ChapterWeights,
    },
    store::{AttemptStore, QuestionBank},
};

/// Scope and budget of a requested attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRequest {
    pub class_tag: ClassTag,
    pub subjects: Vec<String>,
    pub chapters: Vec<String>,
    pub topics: Vec<String>,
    pub types: Vec<QuestionType>,
    pub time_budget_minutes: f64,
    pub student_id: String,
}

impl AllocationRequest {
    pub fn filter(&self) -> QuestionFilter {
        QuestionFilter {
            class_tag: self.class_tag,
            subjects: dedup(&self.subjects),
            chapters: dedup(&self.chapters),
            topics: dedup(&self.topics),
            types: self.types.clone(),
        }
    }
}

/// A freshly persisted attempt together with its questions, in order.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub attempt: Attempt,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPath {
    Weighted,
    Uniform,
}

/// One weighted chapter before the remainder is handed out.
/// `fraction` is the fractional part of the expected count scaled by the
/// weight total, so comparisons stay exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterShare {
    pub chapter: String,
    pub quota: usize,
    pub fraction: u64,
}

/// One question per `MINUTES_PER_QUESTION` minutes, never fewer than one and
/// never more than `MAX_QUESTIONS_PER_ATTEMPT`.
pub fn target_count(time_budget_minutes: f64) -> usize {
    let count = (time_budget_minutes / MINUTES_PER_QUESTION).floor();
    if count.is_nan() || count < 1.0 {
        1
    } else if count >= MAX_QUESTIONS_PER_ATTEMPT as f64 {
        MAX_QUESTIONS_PER_ATTEMPT
    } else {
        count as usize
    }
}

/// Trims, drops empties and removes duplicates, keeping first occurrences.
pub fn dedup(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .map(str::to_string)
        .collect()
}

/// Splits `target` over weighted chapters. The result always sums to `target`
/// when `weights` is non-empty.
pub fn weighted_quotas<R: Rng + ?Sized>(
    weights: &[(String, u32)],
    target: usize,
    rng: &mut R,
) -> Vec<(String, usize)> {
    let total: u64 = weights.iter().map(|(_, w)| u64::from(*w)).sum();
    if total == 0 {
        return Vec::new();
    }

    let target_units = target as u64;
    let shares: Vec<ChapterShare> = weights
        .iter()
        .map(|(chapter, w)| {
            let scaled = u64::from(*w).saturating_mul(target_units);
            ChapterShare {
                chapter: chapter.clone(),
                quota: (scaled / total) as usize,
                fraction: scaled % total,
            }
        })
        .collect();

    let floored: usize = shares.iter().map(|s| s.quota).sum();
    let remainder = target.saturating_sub(floored);

    award_remainder(&shares, remainder, rng)
}

/// Hands out `remainder` extra units one at a time. Each draw picks a chapter
/// with probability proportional to its fraction; a chapter that wins drops
/// out of later draws. Stops early once every fraction is spent.
pub fn award_remainder<R: Rng + ?Sized>(
    shares: &[ChapterShare],
    remainder: usize,
    rng: &mut R,
) -> Vec<(String, usize)> {
    let mut fractions: Vec<u64> = shares.iter().map(|s| s.fraction).collect();
    let mut quotas: Vec<usize> = shares.iter().map(|s| s.quota).collect();

    for _ in 0..remainder {
        let live: u64 = fractions.iter().sum();
        if live == 0 {
            break;
        }
        let mut ticket = rng.gen_range(0..live);
        let winner = fractions.iter().position(|&f| {
            if ticket < f {
                true
            } else {
                ticket -= f;
                false
            }
        });
        let Some(winner) = winner else {
            break;
        };
        quotas[winner] += 1;
        fractions[winner] = 0;
    }

    shares
        .iter()
        .zip(quotas)
        .map(|(share, quota)| (share.chapter.clone(), quota))
        .collect()
}

/// Gives every chapter `target / N`, plus one for `target mod N` chapters
/// picked uniformly at random.
pub fn uniform_quotas<R: Rng + ?Sized>(
    chapters: &[String],
    target: usize,
    rng: &mut R,
) -> Vec<(String, usize)> {
    let chapters = dedup(chapters);
    let n = chapters.len();
    if n == 0 {
        return Vec::new();
    }

    let mut quotas = vec![target / n; n];
    for i in index::sample(rng, n, target % n).into_iter() {
        quotas[i] += 1;
    }

    chapters.into_iter().zip(quotas).collect()
}

/// Chooses between the weighted and uniform paths and returns the quotas.
pub fn plan_quotas<R: Rng + ?Sized>(
    class_tag: ClassTag,
    subjects: &[String],
    chapters: &[String],
    weights: &dyn ChapterWeights,
    target: usize,
    rng: &mut R,
) -> (QuotaPath, Vec<(String, usize)>) {
    let subjects = dedup(subjects);
    let chapters = dedup(chapters);

    if let [subject] = subjects.as_slice() {
        if let Some(table) = weights.weights_for(class_tag, subject) {
            let weighted: Vec<(String, u32)> = chapters
                .iter()
                .filter_map(|c| table.get(c).map(|w| (c.clone(), *w)))
                .collect();
            if !weighted.is_empty() {
                return (QuotaPath::Weighted, weighted_quotas(&weighted, target, rng));
            }
        }
    }

    (QuotaPath::Uniform, uniform_quotas(&chapters, target, rng))
}

/// Drops repeated question ids, keeping the first copy.
fn dedup_pool(pool: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    pool.into_iter().filter(|q| seen.insert(q.id)).collect()
}

/// Samples per-chapter quotas from the pool, then backfills any shortfall
/// from the remaining candidates. Never returns more than `target` questions
/// and never the same id twice.
pub fn select_questions<R: Rng + ?Sized>(
    pool: &[Question],
    quotas: &[(String, usize)],
    target: usize,
    rng: &mut R,
) -> Vec<Question> {
    let mut taken: HashSet<i64> = HashSet::new();
    let mut selected: Vec<&Question> = Vec::with_capacity(target.min(pool.len()));

    for (chapter, quota) in quotas {
        if *quota == 0 {
            continue;
        }
        let mut candidates: Vec<&Question> = pool
            .iter()
            .filter(|q| &q.chapter == chapter && !taken.contains(&q.id))
            .collect();
        candidates.shuffle(rng);
        for q in candidates.into_iter().take(*quota) {
            taken.insert(q.id);
            selected.push(q);
        }
    }

    if selected.len() < target {
        let mut rest: Vec<&Question> = pool.iter().filter(|q| !taken.contains(&q.id)).collect();
        rest.shuffle(rng);
        let missing = target - selected.len();
        for q in rest.into_iter().take(missing) {
            taken.insert(q.id);
            selected.push(q);
        }
    }

    selected.truncate(target);
    selected.into_iter().cloned().collect()
}

fn numeric_label(label: &str) -> Option<f64> {
    label.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Numeric chapter labels sort numerically and ahead of named chapters;
/// named chapters sort lexicographically.
pub fn compare_chapters(a: &str, b: &str) -> Ordering {
    match (numeric_label(a), numeric_label(b)) {
        // "2" and "2.0" tie numerically; fall back to the label so the order is total.
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Groups the selected questions into subjects and sorted chapter lists.
pub fn group_chapters(selected: &[Question]) -> (Vec<String>, BTreeMap<String, Vec<String>>) {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for q in selected {
        grouped.entry(q.subject.clone()).or_default().insert(q.chapter.clone());
    }

    let chapters_by_subject: BTreeMap<String, Vec<String>> = grouped
        .into_iter()
        .map(|(subject, chapters)| {
            let mut chapters: Vec<String> = chapters.into_iter().collect();
            chapters.sort_by(|a, b| compare_chapters(a, b));
            (subject, chapters)
        })
        .collect();
    let subjects = chapters_by_subject.keys().cloned().collect();

    (subjects, chapters_by_subject)
}

/// Allocates and persists a new attempt.
///
/// Fails with `NoQuestionsAvailable` only when the filter matches nothing;
/// in that case no attempt is written.
pub async fn allocate<R: Rng + Send + ?Sized>(
    bank: &dyn QuestionBank,
    store: &dyn AttemptStore,
    weights: &dyn ChapterWeights,
    request: &AllocationRequest,
    rng: &mut R,
) -> QuizResult<Allocation> {
    let target = target_count(request.time_budget_minutes);
    let filter = request.filter();

    let pool = dedup_pool(bank.find(&filter).await?);
    if pool.is_empty() {
        tracing::info!(
            "No questions for class {} subjects {:?} chapters {:?}",
            request.class_tag,
            filter.subjects,
            filter.chapters
        );
        return Err(QuizError::NoQuestionsAvailable);
    }

    // Without a chapter filter every chapter in the pool counts as requested.
    let chapters = if filter.chapters.is_empty() {
        let mut all: Vec<String> = pool
            .iter()
            .map(|q| q.chapter.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        all.sort_by(|a, b| compare_chapters(a, b));
        all
    } else {
        filter.chapters.clone()
    };

    let (path, quotas) = plan_quotas(
        request.class_tag,
        &filter.subjects,
        &chapters,
        weights,
        target,
        rng,
    );
    let selected = select_questions(&pool, &quotas, target, rng);

    if selected.len() < target {
        tracing::warn!(
            "Partial allocation for student {}: {} of {} questions (pool {})",
            request.student_id,
            selected.len(),
            target,
            pool.len()
        );
    }

    let (subjects, chapters_by_subject) = group_chapters(&selected);
    let question_ids: Vec<i64> = selected.iter().map(|q| q.id).collect();

    let draft = NewAttempt {
        student_id: request.student_id.clone(),
        class_tag: request.class_tag,
        subjects,
        requested_chapters: filter.chapters.clone(),
        chapters_by_subject,
        topics: filter.topics.clone(),
        types: filter.types.clone(),
        responses: question_ids.iter().map(|id| QuestionResponse::blank(*id)).collect(),
        max_score: selected.iter().map(|q| q.marks).sum(),
        question_ids,
        time_budget_minutes: request.time_budget_minutes,
        started_at: Utc::now(),
    };

    let attempt = store.insert(draft).await?;

    tracing::info!(
        "Allocated attempt {} for student {}: {} questions via {:?} quotas",
        attempt.id,
        attempt.student_id,
        attempt.question_ids.len(),
        path
    );

    Ok(Allocation {
        attempt,
        questions: selected,
    })
}
