//! Contract tests for the wire format: the frozen error-code table and the
//! `type`/`type_name()` agreement every client and the event log both rely
//! on.

use quiz_protocol::{
    error_codes, ActiveQuestionView, EventPayload, LeaderboardEntry, LeaderboardResponse,
    OptionView, Phase, QuestionStartPayload, QuestionType, QuizStartPayload, QuizStatus,
    StateSyncPayload, TimerView, UserJoinedPayload,
};
use uuid::Uuid;

#[test]
fn error_codes_are_frozen() {
    assert_eq!(error_codes::NOT_FOUND, "NOT_FOUND");
    assert_eq!(error_codes::INVALID_STATE, "INVALID_STATE");
    assert_eq!(error_codes::INVALID_OPTION, "INVALID_OPTION");
    assert_eq!(error_codes::DUPLICATE, "DUPLICATE");
    assert_eq!(error_codes::CLOSED, "CLOSED");
    assert_eq!(error_codes::UNAUTHORISED, "UNAUTHORISED");
    assert_eq!(error_codes::CONFLICT, "CONFLICT");
    assert_eq!(error_codes::TRANSIENT, "TRANSIENT");
    assert_eq!(error_codes::FATAL, "FATAL");
}

/// Every `EventPayload` variant's serialized `type` tag must match
/// `type_name()` -- the event log stores the latter as a plain column while
/// clients dispatch on the former, so the two can never drift apart.
#[test]
fn every_event_payload_variant_serializes_its_own_type_name() {
    let now = chrono::Utc::now();
    let samples = vec![
        EventPayload::QuizStart(QuizStartPayload {
            quiz_id: Uuid::nil(),
            started_at: now,
        }),
        EventPayload::UserJoined(UserJoinedPayload {
            participant_id: Uuid::nil(),
            nickname: "Ada".to_owned(),
        }),
        EventPayload::QuestionStart(QuestionStartPayload {
            question_id: Uuid::nil(),
            text: "2 + 2?".to_owned(),
            question_type: QuestionType::SingleChoice,
            options: vec![OptionView {
                id: Uuid::nil(),
                text: "4".to_owned(),
                display_order: 0,
                is_correct: None,
            }],
            time_limit_seconds: 20,
            order: 0,
            total_questions: 1,
            start_time: now,
        }),
    ];

    for payload in &samples {
        let expected = payload.type_name();
        let json = serde_json::to_value(payload).unwrap();
        assert_eq!(json["type"], expected);
    }
}

#[test]
fn state_sync_payload_carries_per_audience_correctness() {
    let creator_view = ActiveQuestionView {
        question_id: Uuid::nil(),
        text: "Capital of France?".to_owned(),
        options: vec![
            OptionView { id: Uuid::nil(), text: "Paris".to_owned(), display_order: 0, is_correct: Some(true) },
            OptionView { id: Uuid::nil(), text: "Rome".to_owned(), display_order: 1, is_correct: Some(false) },
        ],
        question_type: QuestionType::SingleChoice,
        time_limit_seconds: 20,
        start_time: chrono::Utc::now(),
        order: 0,
        total_questions: 1,
    };
    let snapshot = StateSyncPayload {
        quiz_id: Uuid::nil(),
        title: "Geography".to_owned(),
        status: QuizStatus::Active,
        current_phase: Phase::QuestionActive,
        active_question: Some(creator_view),
        timer: Some(TimerView {
            start_time: chrono::Utc::now(),
            duration_seconds: 20,
            remaining_seconds: 15,
            is_running: true,
        }),
        participants: std::collections::HashMap::new(),
        active_count: 0,
        sequence_number: 4,
        start_time: None,
        end_time: None,
    };

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["active_question"]["options"][0]["is_correct"], true);
    assert_eq!(json["sequence_number"], 4);

    let round_tripped: StateSyncPayload = serde_json::from_value(json).unwrap();
    assert_eq!(round_tripped.title, "Geography");
}

#[test]
fn leaderboard_response_preserves_rank_order() {
    let response = LeaderboardResponse {
        entries: vec![
            LeaderboardEntry { rank: 1, participant_id: Uuid::nil(), name: "Alice".to_owned(), score: 950 },
            LeaderboardEntry { rank: 2, participant_id: Uuid::nil(), name: "Bob".to_owned(), score: 700 },
        ],
    };
    let json = serde_json::to_value(&response).unwrap();
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "Alice");
    assert!(entries[0]["score"].as_i64().unwrap() > entries[1]["score"].as_i64().unwrap());
}
