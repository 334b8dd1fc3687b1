use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quiz_protocol::{error_codes, ApiEnvelope};

/// Crate-wide error taxonomy. Every operation in the phase engine, grader,
/// and leaderboard projector returns one of these; the HTTP boundary maps
/// each variant to a status code and frozen wire code, the WS boundary
/// wraps the same code in an `ERROR` event.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("closed: {0}")]
    Closed(String),
    #[error("unauthorised: {0}")]
    Unauthorised(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => error_codes::NOT_FOUND,
            EngineError::InvalidState(_) => error_codes::INVALID_STATE,
            EngineError::InvalidOption(_) => error_codes::INVALID_OPTION,
            EngineError::Duplicate(_) => error_codes::DUPLICATE,
            EngineError::Closed(_) => error_codes::CLOSED,
            EngineError::Unauthorised(_) => error_codes::UNAUTHORISED,
            EngineError::Conflict(_) => error_codes::CONFLICT,
            EngineError::Transient(_) => error_codes::TRANSIENT,
            EngineError::Fatal(_) => error_codes::FATAL,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidState(_) => StatusCode::CONFLICT,
            EngineError::InvalidOption(_) => StatusCode::BAD_REQUEST,
            EngineError::Duplicate(_) => StatusCode::CONFLICT,
            EngineError::Closed(_) => StatusCode::CONFLICT,
            EngineError::Unauthorised(_) => StatusCode::FORBIDDEN,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Postgres SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound("row".to_owned()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                EngineError::Transient(err.to_string())
            }
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                EngineError::Duplicate(db_err.message().to_owned())
            }
            other => EngineError::Fatal(other.to_string()),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope: ApiEnvelope<()> = ApiEnvelope::err(self.to_string(), self.code());
        (status, Json(envelope)).into_response()
    }
}
