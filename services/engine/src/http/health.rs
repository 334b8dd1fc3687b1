use axum::extract::State;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    "ok"
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if sqlx::query("SELECT 1").execute(&state.pool).await.is_err() {
        return (axum::http::StatusCode::SERVICE_UNAVAILABLE, "pool unavailable");
    }
    (axum::http::StatusCode::OK, "ok")
}
