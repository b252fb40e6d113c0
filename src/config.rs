// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Minutes of time budget per allocated question.
pub const MINUTES_PER_QUESTION: f64 = 3.0;

/// Upper bound on the size of a single attempt.
pub const MAX_QUESTIONS_PER_ATTEMPT: usize = 200;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// JSON file holding the chapter weight table. Unset means no weighting.
    pub chapter_weights_path: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let chapter_weights_path = env::var("CHAPTER_WEIGHTS_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| default_origins());

        Self {
            database_url,
            rust_log,
            bind_addr,
            chapter_weights_path,
            cors_origins,
        }
    }
}

pub fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
