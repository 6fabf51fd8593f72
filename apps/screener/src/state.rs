use std::sync::Arc;

use crate::events::EventLog;
use crate::pipeline::ConsumerSupervisor;
use crate::scoring::DecisionEngine;
use crate::store::ResultStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Same engine the stream consumer uses; stateless and shared without locking.
    pub engine: DecisionEngine,
    pub events: Arc<dyn EventLog>,
    pub results: Arc<dyn ResultStore>,
    pub consumer: Arc<ConsumerSupervisor>,
}
