use axum::extract::{Path, State};

use crate::http::response::{ok_json, HttpResult};
use crate::repo;
use crate::state::AppState;

/// Lets a process self-report liveness outside the WS path, e.g. before it
/// has any clients attached yet. The presence sweep only trusts instances
/// whose heartbeat is recent.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> HttpResult {
    repo::presence::heartbeat(&state.pool, &instance_id).await?;
    Ok(ok_json("heartbeat recorded", ()))
}
