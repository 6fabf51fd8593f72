//! Test fixtures and in-memory stand-ins for the event log and result store.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use crate::events::{EventId, EventLog, EventLogError, StreamEvent, StreamPosition};
use crate::models::{DecisionRecord, FieldMap, Submission};
use crate::notify::MockNotifier;
use crate::pipeline::consumer::DEFAULT_RETRY_INTERVAL;
use crate::pipeline::PipelineComponents;
use crate::scoring::{DecisionEngine, Scorer, ScoringError};
use crate::store::{ResultStore, StoreError};

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A complete, valid event as the dashboard form would append it.
pub fn sample_fields() -> FieldMap {
    fields(&[
        ("name", "Ada Lovelace"),
        ("email", "ada@example.com"),
        ("experience", "6"),
        ("projects_count", "12"),
        ("ai_score", "88"),
        ("salary_expectation", "95000"),
        ("skills", "Python, Machine Learning, Rust"),
        ("education", "MTech"),
        ("certifications", "AWS ML Specialty"),
        ("job_role", "Data Scientist"),
    ])
}

/// A valid event with a low AI score and no certification.
pub fn reject_fields() -> FieldMap {
    fields(&[
        ("name", "Bob Byte"),
        ("email", "bob@example.com"),
        ("experience", "1"),
        ("projects_count", "2"),
        ("ai_score", "20"),
        ("salary_expectation", "150000"),
        ("skills", "react"),
        ("education", "BSC"),
        ("certifications", "None"),
        ("job_role", "Software Engineer"),
    ])
}

pub fn sample_submission() -> Submission {
    Submission::from_fields(&sample_fields()).expect("sample fields are valid")
}

pub fn reject_submission() -> Submission {
    Submission::from_fields(&reject_fields()).expect("reject fields are valid")
}

/// Scorer returning a fixed probability, or failing like a model given bad input.
pub enum StubScorer {
    Probability(f32),
    Fail,
}

#[async_trait]
impl Scorer for StubScorer {
    async fn score(&self, _values: &[f32], _names: &[&str]) -> Result<f32, ScoringError> {
        match self {
            StubScorer::Probability(p) => Ok(*p),
            StubScorer::Fail => Err(ScoringError::Backend("model rejected input".to_string())),
        }
    }
}

/// Components around `log` that reject everything and must never notify.
pub fn pipeline_components(log: Arc<InMemoryEventLog>) -> PipelineComponents {
    PipelineComponents {
        log,
        store: Arc::new(InMemoryResultStore::default()),
        engine: DecisionEngine::new(Arc::new(StubScorer::Probability(0.0))),
        notifier: Arc::new(MockNotifier::new()),
        retry_interval: DEFAULT_RETRY_INTERVAL,
    }
}

/// Polls `condition` until it holds. Meant for paused-clock tests, where sleeping is free.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// ────────────────────────────────────────────────────────────────────────────
// Fake Redis endpoint
// ────────────────────────────────────────────────────────────────────────────

/// Minimal RESP server: answers every command with `+OK` and counts accepted sockets.
pub async fn fake_redis() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("redis://{}", listener.local_addr().unwrap());
    let dials = Arc::new(AtomicUsize::new(0));
    let counter = dials.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut pending = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    pending.extend_from_slice(&buf[..n]);
                    // Each command is a RESP array; its header line starts with '*'
                    while let Some(end) = pending.windows(2).position(|w| w == b"\r\n") {
                        let line: Vec<u8> = pending.drain(..end + 2).collect();
                        if line.first() == Some(&b'*')
                            && socket.write_all(b"+OK\r\n").await.is_err()
                        {
                            return;
                        }
                    }
                }
            });
        }
    });
    (url, dials)
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory event log
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct LogInner {
    events: Vec<StreamEvent>,
    next_millis: u64,
    positions: Vec<StreamPosition>,
    connect_failures: usize,
    connects: usize,
    failing_reads: HashSet<usize>,
    fail_appends: bool,
}

/// Ordered in-memory log with blocking reads and scripted connectivity failures.
pub struct InMemoryEventLog {
    inner: Mutex<LogInner>,
    appended: Notify,
    reads: watch::Sender<usize>,
    connects: watch::Sender<usize>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                next_millis: 1,
                ..Default::default()
            }),
            appended: Notify::new(),
            reads: watch::Sender::new(0),
            connects: watch::Sender::new(0),
        }
    }
}

impl InMemoryEventLog {
    /// Appends directly, bypassing injected failures.
    pub fn push(&self, fields: FieldMap) -> EventId {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = EventId::new(inner.next_millis, 0);
            inner.next_millis += 1;
            inner.events.push(StreamEvent { id, fields });
            id
        };
        self.appended.notify_waiters();
        id
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Position argument of every read call, in call order.
    pub fn positions(&self) -> Vec<StreamPosition> {
        self.inner.lock().unwrap().positions.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.inner.lock().unwrap().connects
    }

    pub fn fail_connects(&self, count: usize) {
        self.inner.lock().unwrap().connect_failures = count;
    }

    /// Makes the n-th read call (1-based) fail as a dropped connection.
    pub fn fail_read_call(&self, call: usize) {
        self.inner.lock().unwrap().failing_reads.insert(call);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.inner.lock().unwrap().fail_appends = fail;
    }

    /// Waits until `count` read calls have started. A started read has fixed its cursor.
    pub async fn wait_for_reads(&self, count: usize) {
        let mut rx = self.reads.subscribe();
        rx.wait_for(|n| *n >= count).await.expect("log dropped");
    }

    pub async fn wait_for_connects(&self, count: usize) {
        let mut rx = self.connects.subscribe();
        rx.wait_for(|n| *n >= count).await.expect("log dropped");
    }

    fn pending_after(&self, cursor: Option<EventId>) -> Vec<StreamEvent> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| cursor.map_or(true, |c| e.id > c))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn connect(&self) -> Result<(), EventLogError> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            inner.connects += 1;
            if inner.connect_failures > 0 {
                inner.connect_failures -= 1;
                Err(EventLogError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        };
        self.connects.send_modify(|n| *n += 1);
        result
    }

    async fn read_after(
        &self,
        position: &StreamPosition,
    ) -> Result<Vec<StreamEvent>, EventLogError> {
        let (call, cursor) = {
            let mut inner = self.inner.lock().unwrap();
            inner.positions.push(*position);
            let call = inner.positions.len();
            let cursor = match position {
                StreamPosition::Tail => inner.events.last().map(|e| e.id),
                StreamPosition::After(id) => Some(*id),
            };
            (call, cursor)
        };
        let fail = self.inner.lock().unwrap().failing_reads.contains(&call);
        self.reads.send_modify(|n| *n += 1);
        if fail {
            return Err(EventLogError::Unavailable("connection reset".to_string()));
        }

        loop {
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.pending_after(cursor);
            if !batch.is_empty() {
                return Ok(batch);
            }
            notified.await;
        }
    }

    async fn append(&self, fields: &FieldMap) -> Result<EventId, EventLogError> {
        if self.inner.lock().unwrap().fail_appends {
            return Err(EventLogError::Unavailable("connection refused".to_string()));
        }
        Ok(self.push(fields.clone()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory result store
// ────────────────────────────────────────────────────────────────────────────

/// Keeps records in their stored field-map form, like the Redis hashes.
#[derive(Default)]
pub struct InMemoryResultStore {
    records: Mutex<BTreeMap<EventId, FieldMap>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryResultStore {
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(record.event_id, record.to_fields());
        Ok(())
    }

    async fn get(&self, id: &EventId) -> Result<Option<DecisionRecord>, StoreError> {
        let stored = self.records.lock().unwrap().get(id).cloned();
        Ok(stored.and_then(|fields| DecisionRecord::from_stored(*id, fields).ok()))
    }

    async fn list(&self) -> Result<Vec<DecisionRecord>, StoreError> {
        let records = self.records.lock().unwrap().clone();
        Ok(records
            .into_iter()
            .filter_map(|(id, fields)| DecisionRecord::from_stored(id, fields).ok())
            .collect())
    }
}
