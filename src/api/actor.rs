use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::HandoverError;

pub const ACTOR_HEADER: &str = "x-user-id";

/// The user making the request, as vouched for by the gateway in front of us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = HandoverError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Actor(s.to_string()))
            .ok_or_else(|| HandoverError::InvalidRequest(format!("{ACTOR_HEADER} header is required")))
    }
}
