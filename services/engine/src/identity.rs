use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use uuid::Uuid;

/// The caller's identity, trusted from headers set by the upstream gateway.
/// Issuing and validating the token behind these headers is out of scope
/// here; the engine only performs the in-core membership checks (is this
/// user the quiz's creator, does this participant belong to this quiz).
#[derive(Debug, Clone, Copy)]
pub enum Principal {
    User(Uuid),
    Participant(Uuid),
}

impl Principal {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Principal::User(id) => Some(*id),
            Principal::Participant(_) => None,
        }
    }

    pub fn participant_id(&self) -> Option<Uuid> {
        match self {
            Principal::Participant(id) => Some(*id),
            Principal::User(_) => None,
        }
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get("x-user-id") {
            let id = value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or((StatusCode::BAD_REQUEST, "invalid X-User-Id header"))?;
            return Ok(Principal::User(id));
        }
        if let Some(value) = parts.headers.get("x-participant-id") {
            let id = value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or((StatusCode::BAD_REQUEST, "invalid X-Participant-Id header"))?;
            return Ok(Principal::Participant(id));
        }
        Err((
            StatusCode::UNAUTHORIZED,
            "missing X-User-Id or X-Participant-Id header",
        ))
    }
}
