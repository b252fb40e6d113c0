// src/main.rs

use dotenvy::dotenv;
use quiz_engine::config::Config;
use quiz_engine::quiz::StaticChapterWeights;
use quiz_engine::routes;
use quiz_engine::state::AppState;
use quiz_engine::store::postgres::{PgAttemptStore, PgQuestionBank};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "quiz-engine.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Load the chapter weight table (optional)
    let weights = match &config.chapter_weights_path {
        Some(path) => {
            let weights = StaticChapterWeights::from_path(path)
                .unwrap_or_else(|e| panic!("Failed to load chapter weights from {}: {}", path, e));
            tracing::info!("Loaded chapter weights for {} subjects from {}", weights.subject_count(), path);
            weights
        }
        None => {
            tracing::info!("No chapter weight table configured, using uniform allocation");
            StaticChapterWeights::empty()
        }
    };

    // Create AppState
    let state = AppState {
        questions: Arc::new(PgQuestionBank::new(pool.clone())),
        attempts: Arc::new(PgAttemptStore::new(pool.clone())),
        weights: Arc::new(weights),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .expect("BIND_ADDR must be a socket address");
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
