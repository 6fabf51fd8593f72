//! Result store: key-value persistence of decision records, one Redis hash per event
//! under `resume_results:<event_id>`.
//!
//! One multiplexed connection is shared by all operations.
//! Writes are plain `HSET` overwrites, so persisting the same record twice is harmless.
//! Reads back the whole namespace for the dashboard listing.

pub mod handlers;

use std::collections::BTreeMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::connection::SharedConnection;
use crate::events::EventId;
use crate::models::{Decision, DecisionRecord, FieldMap};

pub const RESULT_KEY_PREFIX: &str = "resume_results";
const SCAN_BATCH: usize = 200;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

pub fn record_key(id: &EventId) -> String {
    format!("{RESULT_KEY_PREFIX}:{id}")
}

pub fn parse_record_key(key: &str) -> Option<EventId> {
    key.strip_prefix(RESULT_KEY_PREFIX)?
        .strip_prefix(':')?
        .parse()
        .ok()
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Writes the record under its event id, replacing any earlier write.
    async fn put(&self, record: &DecisionRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &EventId) -> Result<Option<DecisionRecord>, StoreError>;

    /// Every stored record, ordered by event id.
    async fn list(&self) -> Result<Vec<DecisionRecord>, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Redis backend
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisResultStore {
    conn: SharedConnection,
}

impl RedisResultStore {
    pub fn new(client: redis::Client) -> Self {
        Self {
            conn: SharedConnection::new(client),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.conn
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn hash(
        &self,
        conn: &mut MultiplexedConnection,
        key: &str,
    ) -> Result<FieldMap, StoreError> {
        let fields: RedisResult<FieldMap> = conn.hgetall(key).await;
        Ok(self.conn.observe(fields).await?)
    }

    async fn scan_keys(&self, conn: &mut MultiplexedConnection) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{RESULT_KEY_PREFIX}:*");
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let page = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async::<_, (u64, Vec<String>)>(conn)
                .await;
            let (next, batch) = self.conn.observe(page).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn put(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let items: Vec<(String, String)> = record.to_fields().into_iter().collect();
        let written: RedisResult<()> = conn
            .hset_multiple(record_key(&record.event_id), &items)
            .await;
        self.conn.observe(written).await?;
        Ok(())
    }

    async fn get(&self, id: &EventId) -> Result<Option<DecisionRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let key = record_key(id);
        let fields = self.hash(&mut conn, &key).await?;
        Ok(restore(&key, *id, fields))
    }

    async fn list(&self) -> Result<Vec<DecisionRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let keys = self.scan_keys(&mut conn).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(id) = parse_record_key(&key) else {
                warn!(%key, "skipping result key without a valid event id");
                continue;
            };
            let fields = self.hash(&mut conn, &key).await?;
            if let Some(record) = restore(&key, id, fields) {
                records.push(record);
            }
        }
        // SCAN may return a key more than once
        records.sort_by_key(|r| r.event_id);
        records.dedup_by_key(|r| r.event_id);
        Ok(records)
    }
}

/// An empty hash means the key does not exist. Hashes without a valid decision are skipped.
fn restore(key: &str, id: EventId, fields: FieldMap) -> Option<DecisionRecord> {
    if fields.is_empty() {
        return None;
    }
    match DecisionRecord::from_stored(id, fields) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(%key, "skipping stored result: {e}");
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dashboard queries
// ────────────────────────────────────────────────────────────────────────────

/// Listing filters. Every set filter must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultFilter {
    pub decision: Option<Decision>,
    pub education: Option<String>,
    pub job_role: Option<String>,
    /// Case-insensitive substring of the candidate name.
    pub name: Option<String>,
}

impl ResultFilter {
    pub fn matches(&self, record: &DecisionRecord) -> bool {
        if self.decision.is_some_and(|d| d != record.decision) {
            return false;
        }
        if let Some(education) = &self.education {
            if record.field("education") != Some(education.as_str()) {
                return false;
            }
        }
        if let Some(role) = &self.job_role {
            if record.field("job_role") != Some(role.as_str()) {
                return false;
            }
        }
        if let Some(needle) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let needle = needle.to_lowercase();
            let matched = record
                .field("name")
                .is_some_and(|n| n.to_lowercase().contains(&needle));
            if !matched {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionCounts {
    pub hire: usize,
    pub reject: usize,
}

impl DecisionCounts {
    fn add(&mut self, decision: Decision) {
        match decision {
            Decision::Hire => self.hire += 1,
            Decision::Reject => self.reject += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub total: usize,
    pub decisions: DecisionCounts,
    pub by_education: BTreeMap<String, DecisionCounts>,
}

pub fn summarize(records: &[DecisionRecord]) -> ResultSummary {
    let mut summary = ResultSummary {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        summary.decisions.add(record.decision);
        let education = record.field("education").unwrap_or("unknown").to_string();
        summary
            .by_education
            .entry(education)
            .or_default()
            .add(record.decision);
    }
    summary
}
