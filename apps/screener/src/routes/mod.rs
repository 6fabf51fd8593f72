pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers as pipeline;
use crate::scoring::handlers as scoring;
use crate::state::AppState;
use crate::store::handlers as results;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Synchronous scoring
        .route("/api/v1/predict", post(scoring::handle_predict))
        // Submission intake (event log producer side)
        .route("/api/v1/resumes", post(pipeline::handle_submit))
        // Dashboard reads
        .route("/api/v1/results", get(results::handle_list_results))
        .route("/api/v1/results/summary", get(results::handle_results_summary))
        .route("/api/v1/results/:id", get(results::handle_get_result))
        // Consumer control
        .route("/api/v1/consumer/start", post(pipeline::handle_start_consumer))
        .route("/api/v1/consumer/status", get(pipeline::handle_consumer_status))
        .with_state(state)
}
