use axum::extract::{Path, State};
use axum::Json;
use quiz_protocol::{JoinQuizRequest, JoinQuizResponse, SubmitAnswerRequest};
use uuid::Uuid;

use crate::error::EngineError;
use crate::http::response::{ok_json, HttpResult};
use crate::identity::Principal;
use crate::repo;
use crate::state::AppState;

async fn require_creator(state: &AppState, quiz_id: Uuid, principal: Principal) -> Result<(), EngineError> {
    let quiz = repo::quiz::find(&state.pool, quiz_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
    match principal.user_id() {
        Some(user_id) if user_id == quiz.creator_user_id => Ok(()),
        _ => Err(EngineError::Unauthorised(
            "only the quiz creator may perform this action".to_owned(),
        )),
    }
}

pub async fn start_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    principal: Principal,
) -> HttpResult {
    require_creator(&state, quiz_id, principal).await?;
    state.engine.start_quiz(quiz_id).await?;
    Ok(ok_json("quiz started", ()))
}

pub async fn start_question(
    State(state): State<AppState>,
    Path((quiz_id, question_id)): Path<(Uuid, Uuid)>,
    principal: Principal,
) -> HttpResult {
    require_creator(&state, quiz_id, principal).await?;
    state.engine.start_question(quiz_id, question_id).await?;
    Ok(ok_json("question started", ()))
}

pub async fn end_question(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    principal: Principal,
) -> HttpResult {
    require_creator(&state, quiz_id, principal).await?;
    state.engine.end_question(quiz_id).await?;
    Ok(ok_json("question ended", ()))
}

pub async fn advance(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    principal: Principal,
) -> HttpResult {
    require_creator(&state, quiz_id, principal).await?;
    let has_next = state.engine.move_to_next_question(quiz_id).await?;
    Ok(ok_json("advanced", serde_json::json!({ "has_next": has_next })))
}

pub async fn end_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    principal: Principal,
) -> HttpResult {
    require_creator(&state, quiz_id, principal).await?;
    state.engine.end_quiz(quiz_id).await?;
    Ok(ok_json("quiz ended", ()))
}

pub async fn join(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Json(req): Json<JoinQuizRequest>,
) -> HttpResult {
    let participant_id = state.engine.join_quiz(quiz_id, &req.nickname).await?;
    Ok(ok_json(
        "joined",
        JoinQuizResponse { participant_id, quiz_id },
    ))
}

/// Join by access code rather than a known `quiz_id` -- the path a
/// participant follows who was handed a short code instead of a link.
pub async fn join_by_code(
    State(state): State<AppState>,
    Json(req): Json<JoinQuizRequest>,
) -> HttpResult {
    let access_code = req
        .access_code
        .as_deref()
        .ok_or_else(|| EngineError::InvalidOption("access_code is required".to_owned()))?;
    let (quiz_id, participant_id) =
        state.engine.join_quiz_by_code(access_code, &req.nickname).await?;
    Ok(ok_json(
        "joined",
        JoinQuizResponse { participant_id, quiz_id },
    ))
}

pub async fn state_sync(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    principal: Principal,
) -> HttpResult {
    let for_creator = matches!(principal, Principal::User(_));
    let snapshot = state.engine.state_sync(quiz_id, for_creator).await?;
    Ok(ok_json("state", snapshot))
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> HttpResult {
    let graded = state
        .engine
        .submit_answer(
            quiz_id,
            req.participant_id,
            req.question_id,
            req.selected_options,
            req.time_taken,
        )
        .await?;
    Ok(ok_json(
        "answer recorded",
        serde_json::json!({ "correct": graded.correct, "score": graded.score }),
    ))
}
