use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::events::EventLogError;
use crate::models::MalformedEvent;
use crate::scoring::ScoringError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),
}

impl From<MalformedEvent> for AppError {
    fn from(err: MalformedEvent) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Bodies that fail to parse or deserialize are reported in the same error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Scoring(e) => (StatusCode::BAD_REQUEST, "SCORING_ERROR", e.to_string()),
            AppError::EventLog(e) => {
                tracing::error!("Event log error: {e}");
                let status = if e.is_connectivity() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (
                    status,
                    "EVENT_LOG_ERROR",
                    "The submission could not be queued".to_string(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Result store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
