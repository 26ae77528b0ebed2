use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::convert::Infallible;

pub const ORDER_TOKEN_HEADER: &str = "x-order-token";

/// Per-order edit secret from `X-Order-Token`, handed to the participant when the order was created.
pub struct OrderEditToken(pub Option<String>);

impl OrderEditToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for OrderEditToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts.headers
            .get(ORDER_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(OrderEditToken(token))
    }
}
