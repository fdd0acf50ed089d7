//! Bounded async job execution with a pruned in-memory ledger.
//!
//! `submit` records a queued job and returns immediately; a fixed number
//! of workers drain the queue. The ledger is bounded two ways — terminal
//! records expire after a TTL measured from `finished_at`, and the oldest
//! records are evicted past a maximum count regardless of TTL — so memory
//! stays bounded under sustained submission load. Polling a pruned id
//! returns "not found"; callers treat that as "result no longer
//! available", not an error.
//!
//! There is no cancellation primitive: once submitted, a job runs to
//! completion or failure.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

/// Failed jobs keep at most this many characters of the error.
const MAX_ERROR_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Lifecycle state of one submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What `submit` hands back: enough to poll.
#[derive(Debug, Clone, Serialize)]
pub struct JobTicket {
    pub job_id: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct JobManagerConfig {
    /// Fixed worker-pool size.
    pub workers: usize,
    /// Terminal records older than this (from `finished_at`) are pruned.
    pub record_ttl: Duration,
    /// Hard ledger bound; oldest records evicted first once exceeded.
    pub max_records: usize,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        JobManagerConfig {
            workers: 2,
            record_ttl: Duration::from_secs(600),
            max_records: 200,
        }
    }
}

struct Ledger {
    records: HashMap<String, JobRecord>,
    /// Job ids in insertion order.
    order: VecDeque<String>,
}

/// Bounded worker pool plus job ledger.
pub struct JobManager {
    ledger: Arc<Mutex<Ledger>>,
    permits: Arc<Semaphore>,
    record_ttl: TimeDelta,
    max_records: usize,
}

impl JobManager {
    pub fn new(config: JobManagerConfig) -> Self {
        JobManager {
            ledger: Arc::new(Mutex::new(Ledger {
                records: HashMap::new(),
                order: VecDeque::new(),
            })),
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
            record_ttl: TimeDelta::from_std(config.record_ttl).unwrap_or(TimeDelta::MAX),
            max_records: config.max_records.max(1),
        }
    }

    /// Record a queued job and schedule it on the worker pool. Returns
    /// without waiting for a worker slot.
    pub fn submit<F>(&self, work: F) -> JobTicket
    where
        F: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        let job_id = Uuid::new_v4().to_string();
        let submitted_at = Utc::now();
        let record = JobRecord {
            job_id: job_id.clone(),
            status: JobStatus::Queued,
            submitted_at,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };

        {
            let mut ledger = lock(&self.ledger);
            ledger.order.push_back(job_id.clone());
            ledger.records.insert(job_id.clone(), record);
            self.prune(&mut ledger);
        }
        info!(job_id = %job_id, "job submitted");

        let ledger = Arc::clone(&self.ledger);
        let permits = Arc::clone(&self.permits);
        let record_ttl = self.record_ttl;
        let max_records = self.max_records;
        let id = job_id.clone();
        tokio::spawn(async move {
            // The semaphore is never closed, but a shutdown mid-acquire
            // simply abandons the queued record.
            let Ok(_permit) = permits.acquire().await else {
                return;
            };
            transition(&ledger, &id, record_ttl, max_records, |record| {
                record.status = JobStatus::Running;
                record.started_at.get_or_insert_with(Utc::now);
            });

            let outcome = work.await;

            transition(&ledger, &id, record_ttl, max_records, |record| {
                record.finished_at = Some(Utc::now());
                match outcome {
                    Ok(value) => {
                        record.status = JobStatus::Completed;
                        record.result = Some(value);
                    }
                    Err(reason) => {
                        record.status = JobStatus::Failed;
                        record.error = Some(truncate_chars(&reason, MAX_ERROR_CHARS));
                        warn!(job_id = %record.job_id, "job failed");
                    }
                }
            });
        });

        JobTicket {
            job_id,
            status: JobStatus::Queued,
            submitted_at,
        }
    }

    /// Snapshot one job record. `include_result` strips the (potentially
    /// large) result payload when false.
    pub fn job(&self, job_id: &str, include_result: bool) -> Option<JobRecord> {
        let ledger = lock(&self.ledger);
        let mut record = ledger.records.get(job_id)?.clone();
        if !include_result {
            record.result = None;
        }
        Some(record)
    }

    pub fn len(&self) -> usize {
        lock(&self.ledger).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, ledger: &mut Ledger) {
        prune(ledger, self.record_ttl, self.max_records);
    }
}

/// Apply a mutation to one record (skipping records already pruned
/// mid-flight), then prune. Both happen under the same lock so a poll
/// never observes a partially-updated record.
fn transition(
    ledger: &Arc<Mutex<Ledger>>,
    job_id: &str,
    record_ttl: TimeDelta,
    max_records: usize,
    mutate: impl FnOnce(&mut JobRecord),
) {
    let mut ledger = lock(ledger);
    if let Some(record) = ledger.records.get_mut(job_id) {
        mutate(record);
    }
    prune(&mut ledger, record_ttl, max_records);
}

fn prune(ledger: &mut Ledger, record_ttl: TimeDelta, max_records: usize) {
    let now = Utc::now();
    let expired: Vec<String> = ledger
        .records
        .values()
        .filter(|r| {
            r.status.is_terminal()
                && r.finished_at
                    .is_some_and(|finished| now - finished > record_ttl)
        })
        .map(|r| r.job_id.clone())
        .collect();
    for id in &expired {
        ledger.records.remove(id);
        ledger.order.retain(|k| k != id);
    }

    while ledger.records.len() > max_records {
        let Some(oldest) = ledger.order.pop_front() else {
            break;
        };
        ledger.records.remove(&oldest);
        warn!(job_id = %oldest, "job record evicted by ledger bound");
    }
}

fn lock(ledger: &Arc<Mutex<Ledger>>) -> std::sync::MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
