//! End-to-end coverage of the phase engine and grader against a real
//! Postgres instance, driven entirely through the HTTP surface.

mod support;

use quiz_protocol::{ApiEnvelope, JoinQuizResponse, LeaderboardResponse};
use support::{seed_question, seed_quiz, spawn_app};
use uuid::Uuid;

async fn join(client: &reqwest::Client, app: &support::TestApp, quiz_id: Uuid, nickname: &str) -> Uuid {
    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/join")))
        .json(&serde_json::json!({ "nickname": nickname }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let envelope: ApiEnvelope<JoinQuizResponse> = resp.json().await.unwrap();
    envelope.data.unwrap().participant_id
}

#[tokio::test]
async fn full_single_choice_quiz_flow_awards_scores_and_ranks_leaderboard() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "General Knowledge").await;
    let (question_id, option_ids) = seed_question(
        &app.pool,
        quiz_id,
        "SINGLE_CHOICE",
        0,
        20,
        &[("Paris", true), ("London", false), ("Berlin", false)],
    )
    .await;

    let alice = join(&client, &app, quiz_id, "Alice").await;
    let bob = join(&client, &app, quiz_id, "Bob").await;

    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/start")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .post(app.http_url(&format!(
            "/quizzes/{quiz_id}/questions/{question_id}/start"
        )))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // Alice answers instantly and correctly; Bob answers slowly but correctly too.
    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/answers")))
        .json(&serde_json::json!({
            "participant_id": alice,
            "question_id": question_id,
            "selected_options": [option_ids[0]],
            "time_taken": 0.5,
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: ApiEnvelope<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(body.data.unwrap()["correct"], true);

    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/answers")))
        .json(&serde_json::json!({
            "participant_id": bob,
            "question_id": question_id,
            "selected_options": [option_ids[0]],
            "time_taken": 18.0,
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let leaderboard_resp = client
        .get(app.http_url(&format!("/quizzes/{quiz_id}/leaderboard")))
        .send()
        .await
        .unwrap();
    let envelope: ApiEnvelope<LeaderboardResponse> = leaderboard_resp.json().await.unwrap();
    let entries = envelope.data.unwrap().entries;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].participant_id, alice, "faster correct answer ranks first");
    assert!(entries[0].score > entries[1].score);

    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/questions/end")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/advance")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: ApiEnvelope<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(body.data.unwrap()["has_next"], false);

    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/end")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn multiple_choice_requires_exact_set_match() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "Science").await;
    let (question_id, option_ids) = seed_question(
        &app.pool,
        quiz_id,
        "MULTIPLE_CHOICE",
        0,
        30,
        &[("O2", true), ("N2", true), ("He", false)],
    )
    .await;
    let participant = join(&client, &app, quiz_id, "Carol").await;

    client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/start")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    client
        .post(app.http_url(&format!(
            "/quizzes/{quiz_id}/questions/{question_id}/start"
        )))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();

    // Only one of the two correct options selected: not correct, no partial credit.
    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/answers")))
        .json(&serde_json::json!({
            "participant_id": participant,
            "question_id": question_id,
            "selected_options": [option_ids[0]],
            "time_taken": 3.0,
        }))
        .send()
        .await
        .unwrap();
    let body: ApiEnvelope<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(body.data.unwrap()["correct"], false);
}

#[tokio::test]
async fn duplicate_answer_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "Rejects").await;
    let (question_id, option_ids) = seed_question(
        &app.pool,
        quiz_id,
        "SINGLE_CHOICE",
        0,
        20,
        &[("A", true), ("B", false)],
    )
    .await;
    let participant = join(&client, &app, quiz_id, "Dave").await;

    client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/start")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    client
        .post(app.http_url(&format!(
            "/quizzes/{quiz_id}/questions/{question_id}/start"
        )))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();

    let first = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/answers")))
        .json(&serde_json::json!({
            "participant_id": participant,
            "question_id": question_id,
            "selected_options": [option_ids[0]],
            "time_taken": 1.0,
        }))
        .send()
        .await
        .unwrap();
    assert!(first.status().is_success());

    let second = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/answers")))
        .json(&serde_json::json!({
            "participant_id": participant,
            "question_id": question_id,
            "selected_options": [option_ids[1]],
            "time_taken": 2.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);
    let envelope: ApiEnvelope<()> = second.json().await.unwrap();
    assert_eq!(envelope.error.as_deref(), Some("DUPLICATE"));
}

#[tokio::test]
async fn non_creator_cannot_start_quiz() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let impostor = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "Locked Down").await;

    let resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/start")))
        .header("x-user-id", impostor.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missed_events_endpoint_returns_gap_free_catchup() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "Catch Up").await;
    let (question_id, _options) = seed_question(
        &app.pool,
        quiz_id,
        "SINGLE_CHOICE",
        0,
        20,
        &[("A", true), ("B", false)],
    )
    .await;

    client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/start")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    client
        .post(app.http_url(&format!(
            "/quizzes/{quiz_id}/questions/{question_id}/start"
        )))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();

    let resp = client
        .get(app.http_url(&format!("/events/quiz/{quiz_id}?after=0")))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    let events = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(events.len(), 2, "quiz start and question start should both be logged");
    let seqs: Vec<i64> = events.iter().map(|e| e["seq"].as_i64().unwrap()).collect();
    assert_eq!(seqs, vec![1, 2]);
}
