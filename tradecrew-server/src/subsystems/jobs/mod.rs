//! Job subsystem: job records, the delayed-job queue, handlers and the worker.
//!
//! A submitted job gets a record first. If the queue takes it, the worker runs it
//! later and writes status transitions back to the record; otherwise it runs inline
//! and the caller gets the finished record back.

pub mod handlers;
pub mod queue;
pub mod store;
pub mod worker;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tradecrew_core::models::{Job, JobKind, JobStatus};
use tradecrew_core::{MarketDataProvider, Result, TradecrewError};
use uuid::Uuid;

use handlers::{run_handler, validate_payload, JobError};
use queue::{FailOutcome, QueueJob, QueueService, QueueStats};

/// Data carried by a queue entry. `job_id` links it to a job record; entries added
/// straight to the queue have none and only log their outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePayload {
    pub job_id: Option<Uuid>,
    pub payload: serde_json::Value,
}

/// How a claimed queue job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Retrying,
    Failed,
}

pub struct JobService {
    pool: PgPool,
    queue: Arc<QueueService>,
    provider: Arc<dyn MarketDataProvider>,
}

impl From<JobError> for TradecrewError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::InvalidPayload(msg) => TradecrewError::Validation(msg),
            JobError::Provider(p) => TradecrewError::Other(p.to_string()),
        }
    }
}

fn queue_data(job_id: Option<Uuid>, payload: serde_json::Value) -> Result<serde_json::Value> {
    serde_json::to_value(QueuePayload { job_id, payload })
        .map_err(|e| TradecrewError::Other(e.to_string()))
}

impl JobService {
    pub fn new(pool: PgPool, queue: Arc<QueueService>, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { pool, queue, provider }
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }

    /// Create a job record and hand it to the queue, or run it now when the queue
    /// cannot take it.
    pub async fn submit_job(&self, kind: JobKind, payload: serde_json::Value) -> Result<Job> {
        validate_payload(kind, &payload)?;

        let job = store::create_job(&self.pool, kind, &payload).await?;
        let data = queue_data(Some(job.id), payload)?;

        if let Some(queue_id) = self.queue.add_job(kind, data).await {
            let attached = store::attach_queue_id(&self.pool, job.id, queue_id).await?;
            tracing::info!(job_id = %job.id, queue_id, kind = %kind, "Job queued");
            return Ok(attached.unwrap_or(job));
        }

        tracing::info!(job_id = %job.id, kind = %kind, "Queue unavailable, running job synchronously");
        self.run_now(job, kind).await
    }

    /// Put raw work on the queue without a job record.
    pub async fn add_to_queue(&self, kind: JobKind, payload: serde_json::Value) -> Result<Option<i64>> {
        validate_payload(kind, &payload)?;
        let data = queue_data(None, payload)?;
        Ok(self.queue.add_job(kind, data).await)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job> {
        store::get_job(&self.pool, id)
            .await?
            .ok_or_else(|| TradecrewError::NotFound(format!("job {id}")))
    }

    pub async fn list_jobs(&self, status: Option<JobStatus>, limit: Option<i64>) -> Result<Vec<Job>> {
        store::list_jobs(&self.pool, status, limit).await
    }

    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.get_queue_stats().await
    }

    async fn run_now(&self, job: Job, kind: JobKind) -> Result<Job> {
        let Some(running) = store::mark_running(&self.pool, job.id).await? else {
            return Ok(job);
        };

        let finished = match run_handler(self.provider.as_ref(), kind, &running.payload).await {
            Ok(result) => store::mark_completed(&self.pool, running.id, &result).await?,
            Err(e) => {
                tracing::warn!(job_id = %running.id, error = %e, "Synchronous job failed");
                store::mark_failed(&self.pool, running.id, &e.to_string()).await?
            }
        };

        Ok(finished.unwrap_or(running))
    }

    /// Run one claimed queue job and report the outcome to both the queue and the
    /// job record. Only queue exhaustion marks the record `failed`.
    pub async fn process_queue_job(&self, job: QueueJob) -> Result<ProcessOutcome> {
        let backend = self
            .queue
            .backend()
            .ok_or_else(|| TradecrewError::Other("queue is disabled".to_string()))?;

        let parsed = job
            .name
            .parse::<JobKind>()
            .map_err(JobError::InvalidPayload)
            .and_then(|kind| {
                serde_json::from_value::<QueuePayload>(job.data.clone())
                    .map(|data| (kind, data))
                    .map_err(|e| JobError::InvalidPayload(e.to_string()))
            });

        let (kind, data) = match parsed {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(queue_id = job.id, name = %job.name, error = %e, "Unprocessable queue job");
                backend.fail(job.id, &e.to_string()).await?;
                return Ok(ProcessOutcome::Failed);
            }
        };

        if let Some(id) = data.job_id {
            if store::mark_running(&self.pool, id).await?.is_none() {
                tracing::warn!(job_id = %id, "Job record not runnable, dropping queue entry");
                backend.complete(job.id).await?;
                return Ok(ProcessOutcome::Completed);
            }
        }

        tracing::info!(
            queue_id = job.id,
            kind = %kind,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        match run_handler(self.provider.as_ref(), kind, &data.payload).await {
            Ok(result) => {
                backend.complete(job.id).await?;
                if let Some(id) = data.job_id {
                    store::mark_completed(&self.pool, id, &result).await?;
                } else {
                    tracing::info!(queue_id = job.id, kind = %kind, "Queue job completed without record");
                }
                Ok(ProcessOutcome::Completed)
            }
            Err(e) => {
                let message = e.to_string();
                match backend.fail(job.id, &message).await? {
                    FailOutcome::Retrying { attempt, delay_ms } => {
                        tracing::warn!(queue_id = job.id, attempt, delay_ms, error = %message, "Job attempt failed, will retry");
                        if let Some(id) = data.job_id {
                            store::record_retry_error(&self.pool, id, &message).await?;
                        }
                        Ok(ProcessOutcome::Retrying)
                    }
                    FailOutcome::Exhausted => {
                        tracing::error!(queue_id = job.id, error = %message, "Job failed after final attempt");
                        if let Some(id) = data.job_id {
                            store::mark_failed(&self.pool, id, &message).await?;
                        }
                        Ok(ProcessOutcome::Failed)
                    }
                }
            }
        }
    }
}
