//! Event log: the ordered, durable stream that submissions are appended to and the
//! consumer reads from.
//!
//! `EventLog` is the seam; `RedisEventLog` is the production backend (Redis streams).

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError, RedisResult};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::connection::{is_connectivity, SharedConnection};
use crate::models::FieldMap;

/// Identifier assigned by the log: `<millis>-<seq>`, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    millis: u64,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid event id '{0}'")]
pub struct InvalidEventId(String);

impl EventId {
    pub fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EventId {
    type Err = InvalidEventId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidEventId(s.to_string());
        let (millis, seq) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self::new(
            millis.parse().map_err(|_| invalid())?,
            seq.parse().map_err(|_| invalid())?,
        ))
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where the next blocking read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// Only events appended after the read is issued.
    Tail,
    /// Strictly after the given event.
    After(EventId),
}

impl StreamPosition {
    /// The id argument for `XREAD`.
    pub fn read_id(&self) -> String {
        match self {
            StreamPosition::Tail => "$".to_string(),
            StreamPosition::After(id) => id.to_string(),
        }
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPosition::Tail => f.write_str("tail"),
            StreamPosition::After(id) => write!(f, "after {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub id: EventId,
    pub fields: FieldMap,
}

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("event log unavailable: {0}")]
    Unavailable(String),

    #[error("event log command failed: {0}")]
    Command(String),
}

impl EventLogError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, EventLogError::Unavailable(_))
    }
}

impl From<RedisError> for EventLogError {
    fn from(err: RedisError) -> Self {
        if is_connectivity(&err) {
            EventLogError::Unavailable(err.to_string())
        } else {
            EventLogError::Command(err.to_string())
        }
    }
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// (Re-)establishes the connection used for blocking reads.
    async fn connect(&self) -> Result<(), EventLogError>;

    /// Blocks until at least one event past `position` exists, then returns the batch in
    /// log order.
    async fn read_after(&self, position: &StreamPosition)
        -> Result<Vec<StreamEvent>, EventLogError>;

    /// Appends an event and returns the id the log assigned to it.
    async fn append(&self, fields: &FieldMap) -> Result<EventId, EventLogError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Redis streams backend
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisEventLog {
    stream_key: String,
    // Dedicated to XREAD BLOCK so appends never queue behind a blocked read.
    reader: SharedConnection,
    writer: SharedConnection,
}

impl RedisEventLog {
    pub fn new(client: redis::Client, stream_key: impl Into<String>) -> Self {
        Self {
            stream_key: stream_key.into(),
            reader: SharedConnection::new(client.clone()),
            writer: SharedConnection::new(client),
        }
    }
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn connect(&self) -> Result<(), EventLogError> {
        self.reader.reset().await;
        let mut conn = self.reader.get().await?;
        let pong = redis::cmd("PING").query_async::<_, String>(&mut conn).await;
        self.reader.observe(pong).await?;
        Ok(())
    }

    async fn read_after(
        &self,
        position: &StreamPosition,
    ) -> Result<Vec<StreamEvent>, EventLogError> {
        let mut conn = self.reader.get().await?;
        let options = StreamReadOptions::default().block(0);
        let reply: RedisResult<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[position.read_id()], &options)
            .await;
        Ok(flatten_reply(self.reader.observe(reply).await?))
    }

    async fn append(&self, fields: &FieldMap) -> Result<EventId, EventLogError> {
        let mut conn = self.writer.get().await?;
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let added: RedisResult<String> = conn.xadd(&self.stream_key, "*", &items).await;
        let id = self.writer.observe(added).await?;
        debug!(stream = %self.stream_key, %id, "appended event");
        id.parse()
            .map_err(|e: InvalidEventId| EventLogError::Command(e.to_string()))
    }
}

/// Flattens an `XREAD` reply into events in delivery order. Non-string values are dropped
/// from the field map, so decoding reports them as missing.
fn flatten_reply(reply: StreamReadReply) -> Vec<StreamEvent> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .filter_map(|entry| {
            let id = match entry.id.parse::<EventId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!("skipping stream entry: {e}");
                    return None;
                }
            };
            let fields = entry
                .map
                .iter()
                .filter_map(|(field, value)| {
                    redis::from_redis_value::<String>(value)
                        .ok()
                        .map(|v| (field.clone(), v))
                })
                .collect();
            Some(StreamEvent { id, fields })
        })
        .collect()
}
