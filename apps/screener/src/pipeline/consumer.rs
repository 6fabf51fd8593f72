//! Stream Consumer: the long-running loop that turns submission events into persisted
//! decisions.
//!
//! State machine:
//!
//! ```text
//!   Connecting ──ok──▶ BlockedWaiting ──events──▶ ProcessingEvent
//!       ▲   │                 │  ▲                      │
//!       │   └──err──┐   err   │  └──────batch drained───┘
//!       │           ▼         ▼
//!       └──interval── Backoff ◀
//! ```
//!
//! Only event log failures move the loop to `Backoff`, and retries are unbounded.
//! Per-event failures (malformed fields, scoring, persistence, notification) are logged
//! and the event is skipped. The read position only moves forward, and it is kept across
//! reconnects, so nothing already handled is read again.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::events::{EventLog, EventLogError, StreamEvent, StreamPosition};
use crate::models::{Decision, DecisionRecord, MalformedEvent, Submission};
use crate::notify::Notifier;
use crate::scoring::{DecisionEngine, ScoringError};
use crate::store::{record_key, ResultStore, StoreError};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Connecting,
    BlockedWaiting,
    ProcessingEvent,
    Backoff,
}

/// Per-event failure. Never stops the loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed event: {0}")]
    Malformed(#[from] MalformedEvent),

    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("failed to persist decision: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Reject decisions never notify.
    NotRequired,
    NoRecipient,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedEvent {
    pub decision: Decision,
    pub notification: Notification,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    pub processed: u64,
    pub failed: u64,
    pub notified: u64,
    pub reconnects: u64,
}

/// Everything a consumer needs, cloneable so a fresh consumer can be built per start.
#[derive(Clone)]
pub struct PipelineComponents {
    pub log: Arc<dyn EventLog>,
    pub store: Arc<dyn ResultStore>,
    pub engine: DecisionEngine,
    pub notifier: Arc<dyn Notifier>,
    pub retry_interval: Duration,
}

impl PipelineComponents {
    pub fn consumer(&self) -> StreamConsumer {
        StreamConsumer::new(self.clone())
    }
}

pub struct StreamConsumer {
    components: PipelineComponents,
    position: StreamPosition,
    stats: ConsumerStats,
}

impl StreamConsumer {
    /// Starts from the log's tail: backlog present at startup is not replayed.
    pub fn new(components: PipelineComponents) -> Self {
        Self {
            components,
            position: StreamPosition::Tail,
            stats: ConsumerStats::default(),
        }
    }

    /// Runs until `cancel` fires. Cancellation is observed at every suspension point
    /// (connect, blocking read, backoff), never in the middle of an event.
    pub async fn run(mut self, cancel: CancellationToken) -> ConsumerStats {
        let mut state = ConsumerState::Connecting;
        let mut pending: VecDeque<StreamEvent> = VecDeque::new();

        info!("stream consumer started");

        loop {
            state = match state {
                ConsumerState::Connecting => {
                    let connected = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.components.log.connect() => result,
                    };
                    match connected {
                        Ok(()) => {
                            info!(position = %self.position, "connected to event log");
                            ConsumerState::BlockedWaiting
                        }
                        Err(err) => {
                            self.report_log_failure(&err);
                            ConsumerState::Backoff
                        }
                    }
                }

                ConsumerState::BlockedWaiting => {
                    let read = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.components.log.read_after(&self.position) => result,
                    };
                    match read {
                        Ok(events) => {
                            pending.extend(events);
                            ConsumerState::ProcessingEvent
                        }
                        Err(err) => {
                            self.report_log_failure(&err);
                            ConsumerState::Backoff
                        }
                    }
                }

                ConsumerState::ProcessingEvent => {
                    while let Some(event) = pending.pop_front() {
                        let id = event.id;
                        self.handle(event).await;
                        self.position = StreamPosition::After(id);
                    }
                    ConsumerState::BlockedWaiting
                }

                ConsumerState::Backoff => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.components.retry_interval) => {}
                    }
                    self.stats.reconnects += 1;
                    ConsumerState::Connecting
                }
            };
        }

        info!(
            processed = self.stats.processed,
            failed = self.stats.failed,
            notified = self.stats.notified,
            reconnects = self.stats.reconnects,
            "stream consumer stopped"
        );
        self.stats
    }

    fn report_log_failure(&self, err: &EventLogError) {
        if err.is_connectivity() {
            warn!(
                "event log connection lost: {err}, retrying in {}s",
                self.components.retry_interval.as_secs_f32()
            );
        } else {
            error!(
                "event log read failed: {err}, retrying in {}s",
                self.components.retry_interval.as_secs_f32()
            );
        }
    }

    async fn handle(&mut self, event: StreamEvent) {
        info!(event_id = %event.id, fields = event.fields.len(), "consumed submission event");
        match self.process(&event).await {
            Ok(outcome) => {
                self.stats.processed += 1;
                if outcome.notification == Notification::Sent {
                    self.stats.notified += 1;
                }
            }
            Err(err) => {
                self.stats.failed += 1;
                error!(event_id = %event.id, "skipping submission event: {err}");
            }
        }
    }

    /// Decode → encode → decide → persist → notify, for one event.
    pub async fn process(&self, event: &StreamEvent) -> Result<ProcessedEvent, PipelineError> {
        let submission = Submission::from_fields(&event.fields)?;

        let decision = self.components.engine.evaluate(&submission).await?;
        info!(event_id = %event.id, %decision, "scored submission");

        let record = DecisionRecord::new(event.id, event.fields.clone(), decision);
        self.components.store.put(&record).await?;
        info!(key = %record_key(&event.id), "stored decision");

        let notification = self.dispatch(&submission, decision).await;

        Ok(ProcessedEvent {
            decision,
            notification,
        })
    }

    async fn dispatch(&self, submission: &Submission, decision: Decision) -> Notification {
        if decision != Decision::Hire {
            return Notification::NotRequired;
        }
        let Some(recipient) = submission.recipient() else {
            warn!("no candidate email provided, skipping hire notification");
            return Notification::NoRecipient;
        };

        match self
            .components
            .notifier
            .notify_hire(recipient, submission.display_name())
            .await
        {
            Ok(()) => {
                info!(recipient, candidate = submission.display_name(), "hire notification sent");
                Notification::Sent
            }
            Err(err) => {
                error!(recipient, "hire notification failed: {err}");
                Notification::Failed
            }
        }
    }
}
