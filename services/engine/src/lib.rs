pub mod bus;
pub mod db;
pub mod engine;
pub mod error;
pub mod http;
pub mod hub;
pub mod identity;
pub mod presence;
pub mod repo;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/:quiz_id/user/:user_id", get(ws::ws_user_handler))
        .route(
            "/ws/:quiz_id/participant/:participant_id",
            get(ws::ws_participant_handler),
        )
        .route("/healthz", get(http::health::healthz))
        .route("/readyz", get(http::health::readyz))
        .route("/quizzes/join", post(http::quiz::join_by_code))
        .route("/quizzes/:quiz_id/join", post(http::quiz::join))
        .route("/quizzes/:quiz_id/start", post(http::quiz::start_quiz))
        .route(
            "/quizzes/:quiz_id/questions/:question_id/start",
            post(http::quiz::start_question),
        )
        .route(
            "/quizzes/:quiz_id/questions/end",
            post(http::quiz::end_question),
        )
        .route("/quizzes/:quiz_id/advance", post(http::quiz::advance))
        .route("/quizzes/:quiz_id/end", post(http::quiz::end_quiz))
        .route("/quizzes/:quiz_id/state", get(http::quiz::state_sync))
        .route("/quizzes/:quiz_id/answers", post(http::quiz::submit_answer))
        .route(
            "/quizzes/:quiz_id/leaderboard",
            get(http::leaderboard::get_leaderboard),
        )
        .route("/events/quiz/:quiz_id", get(http::events::missed))
        .route(
            "/admin/quizzes/:quiz_id/presence",
            get(http::admin::presence),
        )
        .route("/admin/quizzes/:quiz_id/events", get(http::admin::events))
        .route(
            "/internal/instances/:instance_id/heartbeat",
            post(http::instances::heartbeat),
        )
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}
