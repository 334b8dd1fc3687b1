//! The unified client session: one handler for both creator ("user") and
//! participant WebSocket connections, since both share the same hub
//! registration, catch-up, and heartbeat machinery and differ only in which
//! audience-view of each event they receive.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use quiz_protocol::{error_codes, ErrorPayload, EventPayload, InboundMessage, PongPayload, WsEvent};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::compose::strip_correctness_for_participants;
use crate::error::EngineError;
use crate::hub::ClientKind;
use crate::repo;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(54);
const READ_DEADLINE: Duration = Duration::from_secs(60);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const MAX_INBOUND_FRAME_BYTES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    User,
    Participant,
}

pub async fn ws_user_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((quiz_id, user_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    upgrade(ws, state, quiz_id, RouteKind::User, user_id).await
}

pub async fn ws_participant_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((quiz_id, participant_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    upgrade(ws, state, quiz_id, RouteKind::Participant, participant_id).await
}

async fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    quiz_id: Uuid,
    kind: RouteKind,
    id: Uuid,
) -> axum::response::Response {
    match authorize(&state, quiz_id, kind, id).await {
        Ok(()) => ws
            .on_upgrade(move |socket| handle_socket(socket, state, quiz_id, kind, id))
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn authorize(
    state: &AppState,
    quiz_id: Uuid,
    kind: RouteKind,
    id: Uuid,
) -> Result<(), EngineError> {
    let quiz = repo::quiz::find(&state.pool, quiz_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
    match kind {
        RouteKind::User => {
            if quiz.creator_user_id != id {
                return Err(EngineError::Unauthorised(
                    "user is not this quiz's creator".to_owned(),
                ));
            }
        }
        RouteKind::Participant => {
            let participant = repo::participant::find(&state.pool, id)
                .await?
                .ok_or_else(|| EngineError::NotFound("participant".to_owned()))?;
            if participant.quiz_id != quiz_id {
                return Err(EngineError::Unauthorised(
                    "participant does not belong to this quiz".to_owned(),
                ));
            }
        }
    }
    Ok(())
}

async fn send_error(socket: &mut WebSocket, code: &str, message: &str) {
    let event = WsEvent::new(
        EventPayload::Error(ErrorPayload {
            code: code.to_owned(),
            message: message.to_owned(),
        }),
        None,
    );
    if let Ok(json) = serde_json::to_string(&event) {
        let _ = socket.send(Message::Text(json.into())).await;
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    state: AppState,
    quiz_id: Uuid,
    kind: RouteKind,
    id: Uuid,
) {
    let client_kind = match kind {
        RouteKind::User => ClientKind::Creator(id),
        RouteKind::Participant => ClientKind::Participant(id),
    };

    if let Err(e) = state.engine.ensure_quiz_forwarder(quiz_id).await {
        warn!(%quiz_id, error = %e, "failed to attach quiz to cross-instance bus");
    }

    let (client_id, mut outbound_rx) = state.hub.register(quiz_id, client_kind).await;
    if kind == RouteKind::Participant {
        if let Err(e) = state.presence.set_connected(quiz_id, id).await {
            warn!(%quiz_id, participant_id = %id, error = %e, "failed to record presence");
        }
    }
    info!(%quiz_id, client_id = %client_id, ?kind, "client connected");

    match state
        .engine
        .state_sync(quiz_id, kind == RouteKind::User)
        .await
    {
        Ok(snapshot) => {
            let event = WsEvent::new(EventPayload::StateSync(Box::new(snapshot)), None);
            if let Ok(json) = serde_json::to_string(&event) {
                let _ = socket.send(Message::Text(json.into())).await;
            }
        }
        Err(e) => warn!(%quiz_id, error = %e, "failed to compose initial state sync"),
    }

    let mut heartbeat = tokio::time::interval(PING_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            incoming = tokio::time::timeout(READ_DEADLINE, socket.recv()) => {
                match incoming {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if text.len() > MAX_INBOUND_FRAME_BYTES {
                            send_error(&mut socket, error_codes::INVALID_STATE, "frame too large").await;
                            continue;
                        }
                        if !handle_inbound(&mut socket, &state, quiz_id, kind, id, &text).await {
                            break;
                        }
                    }
                    Ok(Some(Ok(Message::Ping(data)))) => { let _ = socket.send(Message::Pong(data)).await; }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                        info!(%quiz_id, client_id = %client_id, "client disconnected");
                        break;
                    }
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => { warn!(%quiz_id, client_id = %client_id, error = %e, "WS error"); break; }
                    Err(_) => { debug!(%quiz_id, client_id = %client_id, "read deadline elapsed"); break; }
                }
            }
            bytes = outbound_rx.recv() => {
                match bytes {
                    Some(bytes) => {
                        let send = tokio::time::timeout(
                            WRITE_DEADLINE,
                            socket.send(Message::Text(String::from_utf8_lossy(&bytes).into_owned().into())),
                        )
                        .await;
                        if !matches!(send, Ok(Ok(()))) {
                            warn!(%quiz_id, client_id = %client_id, "write deadline elapsed or send failed");
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.unregister(quiz_id, client_id).await;
    if kind == RouteKind::Participant {
        if let Err(e) = state.presence.set_disconnected(quiz_id, id).await {
            warn!(%quiz_id, participant_id = %id, error = %e, "failed to clear presence");
        }
        let event = WsEvent::new(
            EventPayload::UserLeft(quiz_protocol::UserLeftPayload { participant_id: id }),
            None,
        );
        if let Err(e) = state.bus.publish(quiz_id, &event).await {
            warn!(%quiz_id, participant_id = %id, error = %e, "failed to publish USER_LEFT");
        }
    }
}

/// Returns `false` when the connection should close.
async fn handle_inbound(
    socket: &mut WebSocket,
    state: &AppState,
    quiz_id: Uuid,
    kind: RouteKind,
    id: Uuid,
    text: &str,
) -> bool {
    let message = match serde_json::from_str::<InboundMessage>(text) {
        Ok(m) => m,
        Err(e) => {
            send_error(socket, error_codes::INVALID_STATE, &format!("invalid JSON: {e}")).await;
            return true;
        }
    };

    match message {
        InboundMessage::Ping => {
            let pong = PongPayload { time: chrono::Utc::now() };
            if let Ok(json) = serde_json::to_string(&pong) {
                let _ = socket.send(Message::Text(json.into())).await;
            }
            true
        }
        InboundMessage::Answer { payload } => {
            if kind != RouteKind::Participant {
                send_error(socket, error_codes::UNAUTHORISED, "only participants submit answers").await;
                return true;
            }
            let result = state
                .engine
                .submit_answer(
                    quiz_id,
                    id,
                    payload.question_id,
                    payload.selected_options,
                    payload.time_taken,
                )
                .await;
            if let Err(e) = result {
                send_error(socket, e.code(), &e.to_string()).await;
            }
            true
        }
    }
}

/// Adapts a [`WsEvent`] from the bus into per-audience hub broadcasts. Every
/// broadcast type is published cluster-wide and delivered locally by each
/// instance's own forwarder; `ANSWER_RECEIVED` is the one private reply, so
/// here it is routed to its target participant (a no-op on any instance
/// that doesn't have that participant attached) rather than broadcast.
pub(crate) async fn fan_out(hub: &crate::hub::ConnectionHub, quiz_id: Uuid, event: &WsEvent) {
    if let EventPayload::AnswerReceived(payload) = &event.payload {
        let Ok(bytes) = serde_json::to_vec(event) else {
            return;
        };
        hub.send_to_participant(quiz_id, payload.participant_id, bytes.into())
            .await;
        return;
    }

    let participant_event = strip_correctness_for_participants(event);
    let Ok(creator_bytes) = serde_json::to_vec(event) else {
        return;
    };
    let Ok(participant_bytes) = serde_json::to_vec(&participant_event) else {
        return;
    };
    hub.broadcast_creators(quiz_id, creator_bytes.into()).await;
    hub.broadcast_participants(quiz_id, participant_bytes.into()).await;
}
