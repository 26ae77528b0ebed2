use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::models::group_session::SessionStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Ordering window closed")]
    WindowClosed,
    #[error("Ordering window must be between {min} and {max} hours (got {requested})")]
    InvalidWindow { min: i64, max: i64, requested: i64 },
    #[error("Session is already {0}")]
    AlreadyTerminal(SessionStatus),
    #[error("Unable to generate a unique session code after {0} attempts")]
    CodeGenerationExhausted(u32),
    #[error("Order can no longer be changed")]
    OrderLocked,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::WindowClosed => "WINDOW_CLOSED",
            AppError::InvalidWindow { .. } => "INVALID_WINDOW",
            AppError::AlreadyTerminal(_) => "ALREADY_TERMINAL",
            AppError::CodeGenerationExhausted(_) => "CODE_GENERATION_EXHAUSTED",
            AppError::OrderLocked => "ORDER_LOCKED",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION",
            AppError::Upstream(_) => "UPSTREAM",
            AppError::Internal | AppError::InternalWithMsg(_) => "INTERNAL",
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(e) => e
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Database(e) => {
                if self.is_unique_violation() {
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({ "error": "Resource already exists (duplicate entry)", "code": "CONFLICT" }))
                    ).into_response();
                }

                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::WindowClosed => (StatusCode::CONFLICT, "Ordering window closed".to_string()),
            AppError::InvalidWindow { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::AlreadyTerminal(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::CodeGenerationExhausted(_) => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Unable to generate unique session code".to_string())
            }
            AppError::OrderLocked => (StatusCode::CONFLICT, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream(msg) => {
                error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream service unavailable".to_string())
            }
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
            AppError::InternalWithMsg(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
