use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::sync::Arc;
use tracing::warn;
use crate::domain::models::group_session::hash_token;
use crate::error::AppError;
use crate::state::AppState;

pub const PAYMENT_CALLBACK_HEADER: &str = "x-payment-callback-token";

/// Proof that the request comes from the payment gateway. Rejects unless
/// `X-Payment-Callback-Token` matches the configured callback secret.
pub struct PaymentCallback;

impl FromRequestParts<Arc<AppState>> for PaymentCallback {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.payment_callback_token.as_deref() else {
            warn!("Payment callback received but PAYMENT_CALLBACK_TOKEN is not configured");
            return Err(AppError::Unauthorized);
        };

        let provided = parts.headers
            .get(PAYMENT_CALLBACK_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .ok_or(AppError::Unauthorized)?;

        if hash_token(provided) != hash_token(expected) {
            warn!("Payment callback rejected: bad callback token");
            return Err(AppError::Unauthorized);
        }

        Ok(PaymentCallback)
    }
}
