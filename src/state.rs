// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    quiz::ChapterWeights,
    store::{AttemptStore, QuestionBank},
};

#[derive(Clone)]
pub struct AppState {
    pub questions: Arc<dyn QuestionBank>,
    pub attempts: Arc<dyn AttemptStore>,
    pub weights: Arc<dyn ChapterWeights>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<dyn QuestionBank> {
    fn from_ref(state: &AppState) -> Self {
        state.questions.clone()
    }
}

impl FromRef<AppState> for Arc<dyn AttemptStore> {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ChapterWeights> {
    fn from_ref(state: &AppState) -> Self {
        state.weights.clone()
    }
}
