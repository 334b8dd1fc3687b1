use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::http::response::{ok_json, HttpResult};
use crate::repo;
use crate::state::AppState;

/// Read-only presence snapshot for operational debugging. Mirrors what
/// `state_sync` already derives internally, exposed directly for a
/// dashboard or an on-call engineer without composing a full state sync.
pub async fn presence(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> HttpResult {
    let rows = repo::presence::active_participants(&state.pool, quiz_id).await?;
    let view: Vec<_> = rows
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "participant_id": r.participant_id,
                "instance_id": r.instance_id,
                "connected": r.connected,
                "last_seen_at": r.last_seen_at,
            })
        })
        .collect();
    Ok(ok_json("presence", view))
}

#[derive(Deserialize)]
pub struct EventsQuery {
    limit: Option<i64>,
}

pub async fn events(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> HttpResult {
    let rows = repo::event_log::missed(&state.pool, quiz_id, 0, query.limit.unwrap_or(500)).await?;
    let view: Vec<_> = rows
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "seq": r.seq,
                "event_type": r.event_type,
                "payload": r.payload,
                "created_at": r.created_at,
            })
        })
        .collect();
    Ok(ok_json("events", view))
}
