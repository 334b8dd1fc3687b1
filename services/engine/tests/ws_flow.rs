//! WebSocket-driven coverage: audience-differentiated correctness visibility
//! and cross-client broadcast fan-out over the bus.

mod support;

use quiz_protocol::EventPayload;
use quiz_test_utils::MockWsClient;
use support::{seed_question, seed_quiz, spawn_app};
use uuid::Uuid;

#[tokio::test]
async fn participant_state_sync_hides_correctness_but_creator_sees_it() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "Hidden Answers").await;
    let (question_id, _options) = seed_question(
        &app.pool,
        quiz_id,
        "SINGLE_CHOICE",
        0,
        20,
        &[("A", true), ("B", false)],
    )
    .await;

    let participant_resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/join")))
        .json(&serde_json::json!({ "nickname": "Eve" }))
        .send()
        .await
        .unwrap();
    let envelope: quiz_protocol::ApiEnvelope<quiz_protocol::JoinQuizResponse> =
        participant_resp.json().await.unwrap();
    let participant_id = envelope.data.unwrap().participant_id;

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

    let mut participant_ws = MockWsClient::connect(&app.ws_url(&format!(
        "/ws/{quiz_id}/participant/{participant_id}"
    )))
    .await
    .unwrap();
    let event = tokio::time::timeout(std::time::Duration::from_secs(5), participant_ws.recv_event())
        .await
        .unwrap()
        .unwrap();
    match event.payload {
        EventPayload::StateSync(snapshot) => {
            let active = snapshot.active_question.expect("question should be active");
            assert!(
                active.options.iter().all(|o| o.is_correct.is_none()),
                "participants must not see correctness before QUESTION_END"
            );
        }
        other => panic!("expected STATE_SYNC, got {other:?}"),
    }

    let mut creator_ws =
        MockWsClient::connect(&app.ws_url(&format!("/ws/{quiz_id}/user/{creator}")))
            .await
            .unwrap();
    let event = tokio::time::timeout(std::time::Duration::from_secs(5), creator_ws.recv_event())
        .await
        .unwrap()
        .unwrap();
    match event.payload {
        EventPayload::StateSync(snapshot) => {
            let active = snapshot.active_question.expect("question should be active");
            assert!(
                active.options.iter().any(|o| o.is_correct == Some(true)),
                "the creator should see which option is correct"
            );
        }
        other => panic!("expected STATE_SYNC, got {other:?}"),
    }
}

#[tokio::test]
async fn question_end_broadcasts_correct_option_ids_to_both_audiences() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let creator = Uuid::new_v4();
    let quiz_id = seed_quiz(&app.pool, creator, "Broadcast Check").await;
    let (question_id, option_ids) = seed_question(
        &app.pool,
        quiz_id,
        "SINGLE_CHOICE",
        0,
        20,
        &[("A", false), ("B", true)],
    )
    .await;

    let participant_resp = client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/join")))
        .json(&serde_json::json!({ "nickname": "Frank" }))
        .send()
        .await
        .unwrap();
    let envelope: quiz_protocol::ApiEnvelope<quiz_protocol::JoinQuizResponse> =
        participant_resp.json().await.unwrap();
    let participant_id = envelope.data.unwrap().participant_id;

    let mut participant_ws = MockWsClient::connect(&app.ws_url(&format!(
        "/ws/{quiz_id}/participant/{participant_id}"
    )))
    .await
    .unwrap();
    // Drain the initial STATE_SYNC.
    tokio::time::timeout(std::time::Duration::from_secs(5), participant_ws.recv_event())
        .await
        .unwrap()
        .unwrap();

    client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/start")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    // QUIZ_START
    tokio::time::timeout(std::time::Duration::from_secs(5), participant_ws.recv_event())
        .await
        .unwrap()
        .unwrap();

    client
        .post(app.http_url(&format!(
            "/quizzes/{quiz_id}/questions/{question_id}/start"
        )))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();
    // QUESTION_START
    tokio::time::timeout(std::time::Duration::from_secs(5), participant_ws.recv_event())
        .await
        .unwrap()
        .unwrap();

    client
        .post(app.http_url(&format!("/quizzes/{quiz_id}/questions/end")))
        .header("x-user-id", creator.to_string())
        .send()
        .await
        .unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), participant_ws.recv_event())
        .await
        .unwrap()
        .unwrap();
    match event.payload {
        EventPayload::QuestionEnd(payload) => {
            assert_eq!(payload.correct_option_ids, vec![option_ids[1]]);
        }
        other => panic!("expected QUESTION_END, got {other:?}"),
    }
}
