//! Lazily opened, shared Redis connection.
//!
//! A `MultiplexedConnection` pipelines concurrent commands over one socket, so callers
//! clone the cached handle instead of dialing per command. The handle is dropped when a
//! command fails for connectivity reasons and the next caller reconnects.

use redis::aio::MultiplexedConnection;
use redis::{RedisError, RedisResult};
use tokio::sync::Mutex;

/// Errors after which the cached connection cannot be trusted.
pub fn is_connectivity(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
}

pub struct SharedConnection {
    client: redis::Client,
    slot: Mutex<Option<MultiplexedConnection>>,
}

impl SharedConnection {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            slot: Mutex::new(None),
        }
    }

    /// The cached connection, opening one if none is held.
    pub async fn get(&self) -> RedisResult<MultiplexedConnection> {
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    pub async fn reset(&self) {
        *self.slot.lock().await = None;
    }

    /// Passes `result` through, dropping the cached connection on connectivity errors.
    pub async fn observe<T>(&self, result: RedisResult<T>) -> RedisResult<T> {
        if let Err(err) = &result {
            if is_connectivity(err) {
                self.reset().await;
            }
        }
        result
    }

    #[cfg(test)]
    async fn is_cached(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
