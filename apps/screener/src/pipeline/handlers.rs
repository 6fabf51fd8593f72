//! Axum route handlers for submission intake and consumer control.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::events::EventId;
use crate::models::Submission;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub event_id: EventId,
}

#[derive(Debug, Serialize)]
pub struct ConsumerStartResponse {
    pub started: bool,
}

#[derive(Debug, Serialize)]
pub struct ConsumerStatusResponse {
    pub running: bool,
}

/// POST /api/v1/resumes
///
/// Appends a submission to the event log for asynchronous screening.
pub async fn handle_submit(
    State(state): State<AppState>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let Json(submission) = payload?;
    submission.validate()?;

    let event_id = state.events.append(&submission.to_fields()).await?;
    info!(%event_id, "submission appended to event log");

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { event_id })))
}

/// POST /api/v1/consumer/start
pub async fn handle_start_consumer(
    State(state): State<AppState>,
) -> Json<ConsumerStartResponse> {
    let started = state.consumer.start().await;
    Json(ConsumerStartResponse { started })
}

/// GET /api/v1/consumer/status
pub async fn handle_consumer_status(
    State(state): State<AppState>,
) -> Json<ConsumerStatusResponse> {
    Json(ConsumerStatusResponse {
        running: state.consumer.is_running().await,
    })
}
