use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::convert::Infallible;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Optional `Idempotency-Key` header. Takes precedence over the body field.
#[derive(Debug, Clone)]
pub struct OptionalIdempotencyKey(pub Option<String>);

impl<S> FromRequestParts<S> for OptionalIdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts.headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(OptionalIdempotencyKey(key))
    }
}

impl OptionalIdempotencyKey {
    /// Header value, else the body value.
    pub fn or_body(self, body_key: Option<String>) -> Option<String> {
        self.0.or(body_key.filter(|k| !k.trim().is_empty()))
    }
}
