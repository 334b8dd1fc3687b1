// quiz-protocol: wire types for the real-time quiz session engine.
//
// All WebSocket events use a top-level `type` field for discriminated
// serialization. The closed set of broadcast event types and inbound
// message types mirrors the session/phase engine's command surface; see
// the session engine crate for the state machine that produces them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type QuizId = Uuid;
pub type QuestionId = Uuid;
pub type OptionId = Uuid;
pub type ParticipantId = Uuid;
pub type UserId = Uuid;

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// Question kind; drives the grader's correctness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
}

/// Status of the authored quiz entity. Owned exclusively by the session
/// engine; never set directly by the authoring layer beyond the initial
/// `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizStatus {
    Waiting,
    Active,
    Completed,
}

/// Sub-state within `QuizStatus::Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    BetweenQuestions,
    QuestionActive,
    ShowingResults,
}

/// A selectable option on a question, as seen by one audience.
///
/// `is_correct` is `None` for a participant before `QUESTION_END`; creators
/// always see it. Never sent as a per-option flag to participants after
/// `QUESTION_END` either -- post-end they instead receive `correct_option_ids`
/// on the `QUESTION_END` payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
    pub display_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

// ---------------------------------------------------------------------------
// Broadcast event payloads (server -> client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStartPayload {
    pub quiz_id: QuizId,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizEndPayload {
    pub quiz_id: QuizId,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStartPayload {
    pub question_id: QuestionId,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<OptionView>,
    pub time_limit_seconds: i32,
    pub order: i32,
    pub total_questions: i32,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEndPayload {
    pub question_id: QuestionId,
    pub correct_option_ids: Vec<OptionId>,
    pub question_type: QuestionType,
    pub end_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerUpdatePayload {
    pub remaining_seconds: i32,
    pub total_seconds: i32,
    pub end_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerReceivedPayload {
    /// Carried so every instance's bus forwarder can route this private
    /// reply to the right locally-attached socket; the event is published
    /// cluster-wide like any other, not addressed point-to-point.
    pub participant_id: ParticipantId,
    pub question_id: QuestionId,
    pub selected_option_ids: Vec<OptionId>,
    pub time_taken: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub participant_id: ParticipantId,
    pub name: String,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardUpdatePayload {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedPayload {
    pub participant_id: ParticipantId,
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftPayload {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseChangePayload {
    pub phase: Phase,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveQuestionView {
    pub question_id: QuestionId,
    pub text: String,
    pub options: Vec<OptionView>,
    pub question_type: QuestionType,
    pub time_limit_seconds: i32,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub order: i32,
    pub total_questions: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub duration_seconds: i32,
    pub remaining_seconds: i32,
    pub is_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub nickname: String,
    pub is_connected: bool,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub score: i32,
}

/// Full state snapshot sent to a newly connected or reconnecting client.
///
/// `is_correct` on nested `OptionView`s is populated only for a creator
/// recipient; the composer must build two variants, one per audience, the
/// same way `QUESTION_START` is published twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSyncPayload {
    pub quiz_id: QuizId,
    pub title: String,
    pub status: QuizStatus,
    pub current_phase: Phase,
    pub active_question: Option<ActiveQuestionView>,
    pub timer: Option<TimerView>,
    pub participants: std::collections::HashMap<ParticipantId, ParticipantView>,
    pub active_count: i32,
    pub sequence_number: i64,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// The closed set of broadcast event payloads, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    QuizStart(QuizStartPayload),
    QuizEnd(QuizEndPayload),
    QuestionStart(QuestionStartPayload),
    QuestionEnd(QuestionEndPayload),
    TimerUpdate(TimerUpdatePayload),
    AnswerReceived(AnswerReceivedPayload),
    LeaderboardUpdate(LeaderboardUpdatePayload),
    UserJoined(UserJoinedPayload),
    UserLeft(UserLeftPayload),
    PhaseChange(PhaseChangePayload),
    StateSync(Box<StateSyncPayload>),
    Error(ErrorPayload),
}

impl EventPayload {
    /// Short discriminant used for sequence-log storage and dashboards.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::QuizStart(_) => "QUIZ_START",
            EventPayload::QuizEnd(_) => "QUIZ_END",
            EventPayload::QuestionStart(_) => "QUESTION_START",
            EventPayload::QuestionEnd(_) => "QUESTION_END",
            EventPayload::TimerUpdate(_) => "TIMER_UPDATE",
            EventPayload::AnswerReceived(_) => "ANSWER_RECEIVED",
            EventPayload::LeaderboardUpdate(_) => "LEADERBOARD_UPDATE",
            EventPayload::UserJoined(_) => "USER_JOINED",
            EventPayload::UserLeft(_) => "USER_LEFT",
            EventPayload::PhaseChange(_) => "PHASE_CHANGE",
            EventPayload::StateSync(_) => "STATE_SYNC",
            EventPayload::Error(_) => "ERROR",
        }
    }
}

/// The envelope written to every client and, for durable types, to the
/// event log.
///
/// `sequence` is `None` for broadcast types that are not part of the
/// gap-free per-quiz stream: `TIMER_UPDATE` (once a second, replaceable by
/// recomputing from `current_question_started_at`), `LEADERBOARD_UPDATE`
/// (a derived projection, recomputable from `participants`),
/// `ANSWER_RECEIVED` (a private reply to the submitter, not cluster state),
/// and `USER_LEFT` (a presence transition a reconnecting client already
/// recovers from the `participants` map in its fresh `STATE_SYNC`). Every
/// other type is logged and carries `Some(seq)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

impl WsEvent {
    pub fn new(payload: EventPayload, sequence: Option<i64>) -> Self {
        Self {
            payload,
            timestamp: chrono::Utc::now(),
            sequence,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound messages (client -> server)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected_options: Vec<OptionId>,
    pub time_taken: f64,
}

/// The closed set of inbound message kinds. `ping` is lower-case and
/// `ANSWER` upper-case on the wire -- an asymmetry carried over verbatim
/// from the external protocol this engine serves, not a typo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "ANSWER")]
    Answer { payload: AnswerSubmission },
}

/// Server -> client reply to a `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongPayload {
    pub time: chrono::DateTime<chrono::Utc>,
}

// ---------------------------------------------------------------------------
// Frozen error codes (§7 of the spec)
// ---------------------------------------------------------------------------

pub mod error_codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INVALID_STATE: &str = "INVALID_STATE";
    pub const INVALID_OPTION: &str = "INVALID_OPTION";
    pub const DUPLICATE: &str = "DUPLICATE";
    pub const CLOSED: &str = "CLOSED";
    pub const UNAUTHORISED: &str = "UNAUTHORISED";
    pub const CONFLICT: &str = "CONFLICT";
    pub const TRANSIENT: &str = "TRANSIENT";
    pub const FATAL: &str = "FATAL";
}

// ---------------------------------------------------------------------------
// HTTP API envelope (frozen schema)
// ---------------------------------------------------------------------------

/// Uniform HTTP response envelope used by every non-WS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn err(message: impl Into<String>, error: impl Into<String>) -> ApiEnvelope<()> {
        ApiEnvelope {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQuizRequest {
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQuizResponse {
    pub participant_id: ParticipantId,
    pub quiz_id: QuizId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub participant_id: ParticipantId,
    pub question_id: QuestionId,
    pub selected_options: Vec<OptionId>,
    pub time_taken: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_event_serializes_with_flattened_tagged_payload() {
        let event = WsEvent::new(
            EventPayload::UserJoined(UserJoinedPayload {
                participant_id: Uuid::nil(),
                nickname: "Ada".to_owned(),
            }),
            Some(3),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "USER_JOINED");
        assert_eq!(json["payload"]["nickname"], "Ada");
        assert_eq!(json["sequence"], 3);
    }

    #[test]
    fn option_view_omits_is_correct_when_none() {
        let view = OptionView {
            id: Uuid::nil(),
            text: "A".to_owned(),
            display_order: 1,
            is_correct: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("is_correct").is_none());
    }

    #[test]
    fn inbound_answer_message_round_trips() {
        let msg = InboundMessage::Answer {
            payload: AnswerSubmission {
                question_id: Uuid::nil(),
                selected_options: vec![Uuid::nil()],
                time_taken: 3.2,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: InboundMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            InboundMessage::Answer { payload } => assert_eq!(payload.time_taken, 3.2),
            InboundMessage::Ping => panic!("expected answer"),
        }
    }

    #[test]
    fn inbound_ping_message_round_trips() {
        let json = r#"{"type":"ping"}"#;
        let parsed: InboundMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, InboundMessage::Ping));
        assert_eq!(serde_json::to_string(&InboundMessage::Ping).unwrap(), json);
    }

    #[test]
    fn api_envelope_ok_sets_success_and_data() {
        let env = ApiEnvelope::ok("created", 42);
        assert!(env.success);
        assert_eq!(env.data, Some(42));
        assert!(env.error.is_none());
    }
}
