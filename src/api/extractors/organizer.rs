use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::convert::Infallible;

pub const ORGANIZER_TOKEN_HEADER: &str = "x-organizer-token";

/// Raw organizer secret from `X-Organizer-Token`. Checked against the session
/// by the handler, since the session is only known after path resolution.
pub struct OrganizerToken(pub Option<String>);

impl OrganizerToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for OrganizerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts.headers
            .get(ORGANIZER_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(OrganizerToken(token))
    }
}
