//! Axum route handlers for the dashboard's read view of stored decisions.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::errors::AppError;
use crate::events::EventId;
use crate::models::DecisionRecord;
use crate::state::AppState;
use crate::store::{summarize, ResultFilter, ResultSummary};

/// GET /api/v1/results
pub async fn handle_list_results(
    State(state): State<AppState>,
    Query(filter): Query<ResultFilter>,
) -> Result<Json<Vec<DecisionRecord>>, AppError> {
    let records = state.results.list().await?;
    Ok(Json(
        records.into_iter().filter(|r| filter.matches(r)).collect(),
    ))
}

/// GET /api/v1/results/summary
pub async fn handle_results_summary(
    State(state): State<AppState>,
) -> Result<Json<ResultSummary>, AppError> {
    let records = state.results.list().await?;
    Ok(Json(summarize(&records)))
}

/// GET /api/v1/results/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DecisionRecord>, AppError> {
    let event_id: EventId = id
        .parse()
        .map_err(|e: crate::events::InvalidEventId| AppError::Validation(e.to_string()))?;

    let record = state
        .results
        .get(&event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No decision stored for event {event_id}")))?;

    Ok(Json(record))
}
