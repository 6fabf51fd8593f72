//! Owns the single background consumer task and its cancellation token.

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::consumer::{ConsumerStats, PipelineComponents};

pub struct ConsumerSupervisor {
    components: PipelineComponents,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<ConsumerStats>>>,
}

impl ConsumerSupervisor {
    pub fn new(components: PipelineComponents, shutdown: CancellationToken) -> Self {
        Self {
            components,
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Spawns the consumer unless one is already running. Returns whether it spawned.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }
        if self.shutdown.is_cancelled() {
            return false;
        }

        let consumer = self.components.consumer();
        *task = Some(tokio::spawn(consumer.run(self.shutdown.child_token())));
        info!("stream consumer task spawned");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Cancels the consumer and waits for it to stop.
    pub async fn shutdown(&self) -> Option<ConsumerStats> {
        self.shutdown.cancel();
        let handle = self.task.lock().await.take()?;
        match handle.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!("stream consumer task failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pipeline_components, InMemoryEventLog};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let log = Arc::new(InMemoryEventLog::default());
        let supervisor =
            ConsumerSupervisor::new(pipeline_components(log.clone()), CancellationToken::new());

        assert!(supervisor.start().await);
        assert!(!supervisor.start().await);
        log.wait_for_reads(1).await;
        assert!(supervisor.is_running().await);
        assert_eq!(log.connect_attempts(), 1);

        let stats = supervisor.shutdown().await.unwrap();
        assert_eq!(stats.processed, 0);
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn test_no_start_after_shutdown() {
        let log = Arc::new(InMemoryEventLog::default());
        let supervisor =
            ConsumerSupervisor::new(pipeline_components(log), CancellationToken::new());

        assert!(supervisor.shutdown().await.is_none());
        assert!(!supervisor.start().await);
    }
}
