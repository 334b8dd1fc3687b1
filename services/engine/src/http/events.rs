use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::response::{ok_json, HttpResult};
use crate::repo;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct MissedQuery {
    after: i64,
    limit: Option<i64>,
}

#[derive(Serialize)]
pub struct MissedEvent {
    pub seq: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// REST counterpart to the WS handshake's automatic catch-up: lets a
/// caller without an open socket pull everything after a known sequence
/// number for a quiz.
pub async fn missed(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Query(query): Query<MissedQuery>,
) -> HttpResult {
    let rows = repo::event_log::missed(
        &state.pool,
        quiz_id,
        query.after,
        query.limit.unwrap_or(DEFAULT_LIMIT),
    )
    .await?;
    let events: Vec<MissedEvent> = rows
        .into_iter()
        .map(|r| MissedEvent {
            seq: r.seq,
            event_type: r.event_type,
            payload: r.payload,
            created_at: r.created_at,
        })
        .collect();
    Ok(ok_json("missed events", events))
}
