mod config;
mod connection;
mod errors;
mod events;
mod features;
mod models;
mod notify;
mod pipeline;
mod routes;
mod scoring;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::events::RedisEventLog;
use crate::notify::SendGridNotifier;
use crate::pipeline::{ConsumerSupervisor, PipelineComponents};
use crate::routes::build_router;
use crate::scoring::model::TreeEnsembleModel;
use crate::scoring::DecisionEngine;
use crate::state::AppState;
use crate::store::RedisResultStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FairAI screener v{}", env!("CARGO_PKG_VERSION"));

    // Load the classifier once; a bad artifact is a startup error
    let model = TreeEnsembleModel::load(&config.model_path)
        .with_context(|| format!("failed to load model from {}", config.model_path.display()))?;
    info!(
        "Model loaded: {} trees over {} features",
        model.num_trees(),
        model.num_feature()
    );
    let engine = DecisionEngine::new(Arc::new(model));

    // Initialize Redis (connections are opened lazily)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let events = Arc::new(RedisEventLog::new(redis.clone(), config.stream_key.clone()));
    let results = Arc::new(RedisResultStore::new(redis));

    let notifier = SendGridNotifier::new(
        config.sendgrid_api_key.clone(),
        config.notify_from_email.clone(),
    )?
    .with_base_url(config.sendgrid_api_url.clone());

    let components = PipelineComponents {
        log: events.clone(),
        store: results.clone(),
        engine: engine.clone(),
        notifier: Arc::new(notifier),
        retry_interval: config.consumer_retry,
    };

    let shutdown = CancellationToken::new();
    let consumer = Arc::new(ConsumerSupervisor::new(components, shutdown.clone()));
    if config.consumer_autostart {
        consumer.start().await;
    } else {
        info!("Consumer autostart disabled; start it via POST /api/v1/consumer/start");
    }

    let state = AppState {
        engine,
        events,
        results,
        consumer: consumer.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some(stats) = consumer.shutdown().await {
        info!(
            processed = stats.processed,
            failed = stats.failed,
            notified = stats.notified,
            reconnects = stats.reconnects,
            "Consumer drained"
        );
    }

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
