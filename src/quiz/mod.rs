// src/quiz/mod.rs

//! Quiz attempt allocator and scoring engine.

pub mod allocator;
pub mod error;
pub mod scorer;
pub mod weights;

pub use allocator::{Allocation, AllocationRequest, allocate};
pub use error::{QuizError, QuizResult};
pub use scorer::{ScoreSummary, load_attempt, submit};
pub use weights::{ChapterWeights, StaticChapterWeights};
