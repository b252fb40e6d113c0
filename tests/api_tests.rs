// tests/api_tests.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use quiz_engine::{
    config::{Config, default_origins},
    models::question::{ClassTag, Difficulty, OptionLetter, Question, QuestionType},
    quiz::StaticChapterWeights,
    routes,
    state::AppState,
    store::memory::{InMemoryAttemptStore, InMemoryQuestionBank},
};

fn question(id: i64, subject: &str, chapter: &str) -> Question {
    Question {
        id,
        class_tag: ClassTag::Neet,
        subject: subject.to_string(),
        chapter: chapter.to_string(),
        topics: BTreeSet::from(["core".to_string()]),
        question_type: QuestionType::SingleAnswer,
        prompt_text: format!("Question {}", id),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        explanation_text: "Analysis".to_string(),
        correct_options: BTreeSet::from([OptionLetter::A]),
        difficulty: Difficulty::Easy,
        marks: 4,
    }
}

fn multi_select(id: i64, chapter: &str) -> Question {
    let mut q = question(id, "Chemistry", chapter);
    q.question_type = QuestionType::MultiSelect;
    q.correct_options = BTreeSet::from([OptionLetter::A, OptionLetter::C]);
    q
}

/// Seeds a bank with Physics chapters "1" and "2" (5 questions each) and
/// two Chemistry multi-select questions.
fn seed_bank() -> InMemoryQuestionBank {
    let mut questions = Vec::new();
    for i in 1..=5 {
        questions.push(question(i, "Physics", "1"));
        questions.push(question(100 + i, "Physics", "2"));
    }
    questions.push(multi_select(200, "Bonding"));
    questions.push(multi_select(201, "Bonding"));
    InMemoryQuestionBank::new(questions).expect("Seed questions must be valid")
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let config = Config {
        database_url: String::new(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        chapter_weights_path: None,
        cors_origins: default_origins(),
    };

    let weights = StaticChapterWeights::empty()
        .with(ClassTag::Neet, "Physics", "1", 7)
        .unwrap()
        .with(ClassTag::Neet, "Physics", "2", 8)
        .unwrap();

    let state = AppState {
        questions: Arc::new(seed_bank()),
        attempts: Arc::new(InMemoryAttemptStore::new()),
        weights: Arc::new(weights),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn student() -> String {
    format!("s_{}", &uuid::Uuid::new_v4().to_string()[..8])
}

async fn create_attempt(
    client: &reqwest::Client,
    address: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(&format!("{}/api/quiz/attempt", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn unknown_route_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn create_attempt_returns_sized_weighted_quiz() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: 9 minutes => 3 questions, split 7:8 over chapters 1 and 2
    let response = create_attempt(
        &client,
        &address,
        serde_json::json!({
            "class": "NEET",
            "subjects": ["Physics"],
            "chapters": ["1", "2"],
            "topics": [],
            "types": [],
            "time": 9,
            "studentId": student()
        }),
    )
    .await;

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();

    let questions = body["questions"].as_array().expect("questions array");
    assert_eq!(questions.len(), 3);
    let ids: BTreeSet<i64> = questions.iter().map(|q| q["id"].as_i64().unwrap()).collect();
    assert_eq!(ids.len(), 3, "no question may repeat");

    let in_chapter = |c: &str| questions.iter().filter(|q| q["chapter"] == c).count();
    assert!((1..=2).contains(&in_chapter("1")));
    assert!((1..=2).contains(&in_chapter("2")));

    assert!(body["quizId"].as_i64().is_some());
    assert_eq!(body["subjects"], serde_json::json!(["Physics"]));
    assert!(body["chaptersBySubject"]["Physics"].as_array().is_some());
}

#[tokio::test]
async fn create_attempt_with_empty_pool_is_400() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = create_attempt(
        &client,
        &address,
        serde_json::json!({
            "class": "JEE",
            "subjects": ["Physics"],
            "time": 30,
            "studentId": student()
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn create_attempt_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let bad_time = create_attempt(
        &client,
        &address,
        serde_json::json!({ "class": "NEET", "time": 0, "studentId": student() }),
    )
    .await;
    assert_eq!(bad_time.status().as_u16(), 400);

    let huge_time = create_attempt(
        &client,
        &address,
        serde_json::json!({
            "class": "NEET",
            "subjects": ["Physics"],
            "time": 1e300,
            "studentId": student()
        }),
    )
    .await;
    assert_eq!(huge_time.status().as_u16(), 400);

    let bad_type = create_attempt(
        &client,
        &address,
        serde_json::json!({ "class": "NEET", "types": ["essay"], "time": 9, "studentId": student() }),
    )
    .await;
    assert_eq!(bad_type.status().as_u16(), 400);
}

#[tokio::test]
async fn partial_pool_is_accepted() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // 60 minutes asks for 20 questions; Chemistry only has 2.
    let response = create_attempt(
        &client,
        &address,
        serde_json::json!({
            "class": "NEET",
            "subjects": ["Chemistry"],
            "time": 60,
            "studentId": student()
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn submit_flow_scores_and_rejects_resubmission() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = create_attempt(
        &client,
        &address,
        serde_json::json!({
            "class": "NEET",
            "subjects": ["Chemistry"],
            "time": 6,
            "studentId": student()
        }),
    )
    .await
    .json()
    .await
    .unwrap();

    let quiz_id = created["quizId"].as_i64().unwrap();
    let questions = created["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    let first = questions[0]["id"].as_i64().unwrap();

    // Act: answer the first question with the key in reverse order, skip the second.
    let submit_resp = client
        .post(&format!("{}/api/quiz/submit/{}", address, quiz_id))
        .json(&serde_json::json!({
            "responses": [
                { "question": first, "selectedOption": ["c", "a"], "timeSpent": 40 }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");

    // Assert
    assert_eq!(submit_resp.status().as_u16(), 200);
    let result: serde_json::Value = submit_resp.json().await.unwrap();
    assert_eq!(result["correct"], 1);
    assert_eq!(result["incorrect"], 0);
    assert_eq!(result["unattempted"], 1);
    assert_eq!(result["score"], 4);
    assert_eq!(result["maxScore"], 8);

    // A second submission must not overwrite the first result.
    let again = client
        .post(&format!("{}/api/quiz/submit/{}", address, quiz_id))
        .json(&serde_json::json!({
            "responses": [
                { "question": first, "selectedOption": "b", "timeSpent": 1 }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(again.status().as_u16(), 409);

    let stored: serde_json::Value = client
        .get(&format!("{}/api/quiz/attempt/{}", address, quiz_id))
        .send()
        .await
        .expect("Fetch failed")
        .json()
        .await
        .unwrap();
    assert_eq!(stored["status"], "completed");
    assert_eq!(stored["correctCount"], 1);
    assert_eq!(stored["responses"][0]["selectedOptions"], serde_json::json!(["a", "c"]));
}

#[tokio::test]
async fn submit_unknown_attempt_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quiz/submit/{}", address, 987654))
        .json(&serde_json::json!({ "responses": [] }))
        .send()
        .await
        .expect("Submit failed");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn reading_an_attempt_leaves_it_in_progress() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let student_id = student();

    let created: serde_json::Value = create_attempt(
        &client,
        &address,
        serde_json::json!({
            "class": "NEET",
            "subjects": ["Physics"],
            "time": 12,
            "studentId": student_id
        }),
    )
    .await
    .json()
    .await
    .unwrap();
    let quiz_id = created["quizId"].as_i64().unwrap();

    for _ in 0..2 {
        let stored: serde_json::Value = client
            .get(&format!("{}/api/quiz/attempt/{}", address, quiz_id))
            .send()
            .await
            .expect("Fetch failed")
            .json()
            .await
            .unwrap();
        assert_eq!(stored["status"], "in_progress");
        assert_eq!(stored["questionIds"].as_array().unwrap().len(), 4);
    }

    let listed: Vec<serde_json::Value> = client
        .get(&format!("{}/api/quiz/attempts?studentId={}", address, student_id))
        .send()
        .await
        .expect("List failed")
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["quizId"], quiz_id);
    assert_eq!(listed[0]["questionCount"], 4);
}

#[tokio::test]
async fn filters_list_chapters_with_weights() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/quiz/filters?class=NEET&subject=Physics", address))
        .send()
        .await
        .expect("Fetch failed");

    assert_eq!(response.status().as_u16(), 200);
    let chapters: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        chapters,
        serde_json::json!([
            { "chapter": "1", "weight": 7 },
            { "chapter": "2", "weight": 8 }
        ])
    );
}
