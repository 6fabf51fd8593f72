//! Axum route handler for synchronous single-record scoring.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Decision, Submission};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub decision: Decision,
}

/// POST /api/v1/predict
///
/// Scores one submission with the same encoder and model the stream consumer uses.
/// Nothing is persisted and no notification is sent.
pub async fn handle_predict(
    State(state): State<AppState>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let Json(submission) = payload?;
    submission.validate()?;
    let decision = state.engine.evaluate(&submission).await?;
    Ok(Json(PredictResponse { decision }))
}
