// tests/api_tests.rs

use quiz_backend::{
    blob::LocalBlobStore, config::Config, routes, state::AppState, store::MemoryStore,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};

fn test_catalog() -> Value {
    json!({
        "rust": {
            "id": "rust",
            "title": "Rust Basics",
            "subTitle": "Ownership and friends",
            "duration": 60,
            "questions": {
                "0": {"text": "Which keyword declares a constant?", "options": ["let", "const", "static mut"], "correctAnswer": 1},
                "1": {"text": "Borrow checker runs at?", "options": ["compile time", "run time"], "correctAnswer": 0},
                "2": {"text": "Box<T> lives on?", "options": ["stack", "heap"], "correctAnswer": 1}
            }
        },
        "blitz": {
            "id": "blitz",
            "title": "Blitz",
            "subTitle": "Ten ticks",
            "duration": 10,
            "questions": [
                {"text": "1 + 1?", "options": ["2", "3"], "correctAnswer": 0}
            ]
        }
    })
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let blob_dir = std::env::temp_dir().join(format!("quiz-api-{}", uuid::Uuid::new_v4()));

    // 1. Create test configuration; ticks are shortened so timeouts are quick
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        default_quiz_duration_secs: 300,
        tick_interval: Duration::from_millis(20),
        blob_dir: blob_dir.clone(),
        public_base_url: url::Url::parse("http://localhost:3000/").unwrap(),
        default_profile_picture_url: "http://localhost:3000/blobs/profile.png".to_string(),
        catalog_seed_file: None,
        finished_session_ttl: Duration::from_secs(300),
        user_idle_ttl: Duration::from_secs(1800),
    };

    // 2. In-memory store seeded with the catalog
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(LocalBlobStore::new(blob_dir, config.public_base_url.clone()));
    let state = AppState::new(config, store, blobs);

    state.catalog.seed_if_empty(test_catalog()).await.unwrap();
    state.catalog.start().await.unwrap();
    state
        .catalog
        .subscribe()
        .wait_for(|s| !s.loading)
        .await
        .unwrap();

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn register(client: &reqwest::Client, address: &str) -> (String, String) {
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "email": email,
            "username": "tester",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let body: Value = resp.json().await.unwrap();
    (
        body["token"].as_str().expect("Token not found").to_string(),
        email,
    )
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_then_login_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, email) = register(&client, &address).await;

    let resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({"email": email, "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert!(body["token"].is_string());
    assert_eq!(body["state"]["status"], "authenticated");
}

#[tokio::test]
async fn register_rejects_empty_fields() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({"email": "a@example.com", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Email, username, or password can't be empty");
}

#[tokio::test]
async fn duplicate_email_conflicts_and_bad_password_is_unauthorized() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, email) = register(&client, &address).await;

    let again = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({"email": email, "username": "other", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let wrong = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({"email": email, "password": "not-the-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);
}

#[tokio::test]
async fn catalog_lists_seeded_quizzes() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/api/quizzes", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["loading"], false);
    let ids: Vec<&str> = body["quizzes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"rust"));
    assert!(ids.contains(&"blitz"));

    let questions: Vec<Value> = client
        .get(format!("{}/api/quizzes/rust/questions", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[2]["correctAnswer"], 1);
}

#[tokio::test]
async fn sessions_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/sessions", address))
        .json(&json!({"quizId": "rust"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .get(format!("{}/api/me", address))
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn full_quiz_session_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &address).await;
    let auth = format!("Bearer {}", token);

    // 1. Start
    let created: Value = client
        .post(format!("{}/api/sessions", address))
        .header("Authorization", &auth)
        .json(&json!({"quizId": "rust"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["route"], "question_screen/rust");
    let session_id = created["sessionId"].as_str().unwrap().to_string();
    let session_url = format!("{}/api/sessions/{}", address, session_id);

    let snapshot: Value = client
        .get(&session_url)
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["state"]["kind"], "awaitingAnswer");
    assert_eq!(snapshot["totalQuestions"], 3);
    assert_eq!(snapshot["quizTitle"], "Rust Basics");
    assert!(snapshot["question"]["correctOption"].is_null());

    // 2. Answer: right, wrong, right
    let picks = [(0, 1), (1, 1), (2, 1)];
    for (question, option) in picks {
        let selected: Value = client
            .post(format!("{}/select", session_url))
            .header("Authorization", &auth)
            .json(&json!({"question": question, "option": option}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(selected["selection"]["accepted"].is_object());

        // A second pick on the same question is ignored
        let again: Value = client
            .post(format!("{}/select", session_url))
            .header("Authorization", &auth)
            .json(&json!({"question": question, "option": 0}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(again["selection"], "ignored");

        client
            .post(format!("{}/advance", session_url))
            .header("Authorization", &auth)
            .send()
            .await
            .unwrap();
    }

    // 3. Result
    let result: Value = client
        .get(format!("{}/result", session_url))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["route"], "grades_screen/66");
    assert_eq!(result["message"], "Good effort!");

    // 4. Attempt recorded
    let attempts: Value = client
        .get(format!("{}/api/me/attempts", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempts["attempts"][0]["quizId"], "rust");
    assert_eq!(attempts["attempts"][0]["quizTitle"], "Rust Basics");
    assert_eq!(attempts["attempts"][0]["gradePercentage"], 66);
    assert_eq!(attempts["completedUniqueQuizCount"], 1);

    // 5. Finished sessions refuse further commands
    let late = client
        .post(format!("{}/advance", session_url))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(late.status().as_u16(), 409);
}

#[tokio::test]
async fn unanswered_session_times_out_with_zero() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &address).await;
    let auth = format!("Bearer {}", token);

    let created: Value = client
        .post(format!("{}/api/sessions", address))
        .header("Authorization", &auth)
        .json(&json!({"quizId": "blitz"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_url = format!(
        "{}/api/sessions/{}",
        address,
        created["sessionId"].as_str().unwrap()
    );

    // Result is refused while the clock is still running
    let early = client
        .get(format!("{}/result", session_url))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(early.status().as_u16(), 409);

    // Ten 20ms ticks end the quiz
    tokio::time::sleep(Duration::from_millis(600)).await;

    let result: Value = client
        .get(format!("{}/result", session_url))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["route"], "grades_screen/0");
    assert_eq!(result["message"], "Oh No! You might want to retake the quiz");
}

#[tokio::test]
async fn other_users_cannot_see_a_session() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (owner, _) = register(&client, &address).await;
    let (intruder, _) = register(&client, &address).await;

    let created: Value = client
        .post(format!("{}/api/sessions", address))
        .header("Authorization", format!("Bearer {}", owner))
        .json(&json!({"quizId": "rust"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .get(format!(
            "{}/api/sessions/{}",
            address,
            created["sessionId"].as_str().unwrap()
        ))
        .header("Authorization", format!("Bearer {}", intruder))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &address).await;
    let auth = format!("Bearer {}", token);

    let resp = client
        .post(format!("{}/api/auth/logout", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = client
        .get(format!("{}/api/me", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}
