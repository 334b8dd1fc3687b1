use axum::response::{IntoResponse, Response};
use axum::Json;
use quiz_protocol::ApiEnvelope;

pub type HttpResponse = Response;
pub type HttpResult = Result<HttpResponse, crate::error::EngineError>;

pub fn ok_json<T: serde::Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    Json(ApiEnvelope::ok(message, data)).into_response()
}
