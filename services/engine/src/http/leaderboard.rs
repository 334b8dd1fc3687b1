use axum::extract::{Path, Query, State};
use quiz_protocol::LeaderboardResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::http::response::{ok_json, HttpResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    limit: Option<i64>,
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> HttpResult {
    let entries = state.engine.get_leaderboard(quiz_id, query.limit).await?;
    Ok(ok_json("leaderboard", LeaderboardResponse { entries }))
}
