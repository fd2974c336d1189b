//! Delayed-job queue wrapper.
//!
//! `QueueService` is connected once at startup. If the backend cannot be reached within
//! the connect timeout the service stays disabled for the rest of the process: every
//! `add_job` returns `None` and callers run the work inline instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tradecrew_core::config::QueueConfig;
use tradecrew_core::models::JobKind;
use tradecrew_core::{Result, TradecrewConfig, TradecrewError};

/// Retry policy attached to each enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl From<&QueueConfig> for JobOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            backoff_ms: config.backoff_ms,
        }
    }
}

/// A job claimed from the queue. `attempts_made` counts this attempt.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueJob {
    pub id: i64,
    pub name: String,
    pub data: serde_json::Value,
    pub attempts_made: i32,
    pub max_attempts: i32,
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-queued; runs again after `delay_ms`.
    Retrying { attempt: i32, delay_ms: u64 },
    /// Out of attempts; the job is parked as failed.
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QueueCounts {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub available: bool,
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn enqueue(&self, name: &str, data: serde_json::Value, options: JobOptions) -> Result<i64>;

    /// Claim one due job, if any.
    async fn dequeue(&self) -> Result<Option<QueueJob>>;

    async fn complete(&self, id: i64) -> Result<()>;

    async fn fail(&self, id: i64, error: &str) -> Result<FailOutcome>;

    async fn counts(&self) -> Result<QueueCounts>;
}

/// Delay before retry number `attempt` (1-based): `backoff_ms * 2^(attempt-1)`.
pub fn backoff_delay(backoff_ms: u64, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    backoff_ms.saturating_mul(1u64 << exponent)
}

// ============================================================================
// QueueService
// ============================================================================

pub struct QueueService {
    backend: Option<Arc<dyn QueueBackend>>,
    options: JobOptions,
}

impl QueueService {
    /// Connect the Postgres-backed queue at `queue.url` (or the main database URL).
    /// Never fails: an unreachable backend yields a disabled service.
    pub async fn connect(config: &TradecrewConfig) -> Self {
        let timeout = Duration::from_secs(config.queue.connect_timeout_seconds);
        let options = JobOptions::from(&config.queue);

        match PgQueueBackend::connect(config.queue_url(), timeout).await {
            Ok(backend) => {
                tracing::info!("Job queue connected");
                Self {
                    backend: Some(Arc::new(backend)),
                    options,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Job queue unavailable, jobs will run synchronously");
                Self {
                    backend: None,
                    options,
                }
            }
        }
    }

    pub fn with_backend(backend: Arc<dyn QueueBackend>, config: &QueueConfig) -> Self {
        Self {
            backend: Some(backend),
            options: JobOptions::from(config),
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            options: JobOptions::from(&QueueConfig::default()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&Arc<dyn QueueBackend>> {
        self.backend.as_ref()
    }

    /// Enqueue a job. `None` means the caller must do the work itself.
    pub async fn add_job(&self, kind: JobKind, data: serde_json::Value) -> Option<i64> {
        let backend = self.backend.as_ref()?;
        match backend.enqueue(kind.as_str(), data, self.options).await {
            Ok(id) => {
                tracing::debug!(queue_id = id, kind = %kind, "Job enqueued");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Enqueue failed");
                None
            }
        }
    }

    pub async fn get_queue_stats(&self) -> QueueStats {
        let Some(backend) = self.backend.as_ref() else {
            return QueueStats::default();
        };

        match backend.counts().await {
            Ok(c) => QueueStats {
                available: true,
                waiting: c.waiting,
                active: c.active,
                completed: c.completed,
                failed: c.failed,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Queue stats unavailable");
                QueueStats::default()
            }
        }
    }
}

// ============================================================================
// PgQueueBackend
// ============================================================================

/// Queue stored in a `queue_jobs` table. Claims use `FOR UPDATE SKIP LOCKED`, so
/// several consumers never receive the same job.
pub struct PgQueueBackend {
    pool: PgPool,
}

impl PgQueueBackend {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let connecting = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(url);

        let pool = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| {
                TradecrewError::Other(format!("queue connect timed out after {}s", timeout.as_secs()))
            })??;

        let backend = Self { pool };
        backend.ensure_schema().await?;
        Ok(backend)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_jobs (
                id            BIGSERIAL PRIMARY KEY,
                name          TEXT NOT NULL,
                data          JSONB NOT NULL DEFAULT '{}'::jsonb,
                state         TEXT NOT NULL DEFAULT 'waiting',
                attempts_made INTEGER NOT NULL DEFAULT 0,
                max_attempts  INTEGER NOT NULL DEFAULT 3,
                backoff_ms    BIGINT NOT NULL DEFAULT 1000,
                run_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_error    TEXT,
                created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS queue_jobs_due_idx ON queue_jobs (run_at) WHERE state = 'waiting'",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl QueueBackend for PgQueueBackend {
    async fn enqueue(&self, name: &str, data: serde_json::Value, options: JobOptions) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO queue_jobs (name, data, max_attempts, backoff_ms) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(name)
        .bind(data)
        .bind(options.attempts as i32)
        .bind(options.backoff_ms as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<QueueJob>> {
        let job = sqlx::query_as::<_, QueueJob>(
            r#"
            UPDATE queue_jobs
            SET state = 'active', attempts_made = attempts_made + 1, updated_at = now()
            WHERE id = (
                SELECT id FROM queue_jobs
                WHERE state = 'waiting' AND run_at <= now()
                ORDER BY run_at, id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, name, data, attempts_made, max_attempts
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn complete(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE queue_jobs SET state = 'completed', last_error = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: i64, error: &str) -> Result<FailOutcome> {
        let row: Option<(i32, i32, i64)> = sqlx::query_as(
            "SELECT attempts_made, max_attempts, backoff_ms FROM queue_jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let (attempt, max_attempts, backoff_ms) =
            row.ok_or_else(|| TradecrewError::NotFound(format!("queue job {id}")))?;

        if attempt < max_attempts {
            let delay_ms = backoff_delay(backoff_ms.max(0) as u64, attempt.max(1) as u32);
            sqlx::query(
                r#"
                UPDATE queue_jobs
                SET state = 'waiting', last_error = $2,
                    run_at = now() + make_interval(secs => $3),
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(error)
            .bind(delay_ms as f64 / 1000.0)
            .execute(&self.pool)
            .await?;
            Ok(FailOutcome::Retrying { attempt, delay_ms })
        } else {
            sqlx::query(
                "UPDATE queue_jobs SET state = 'failed', last_error = $2, updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;
            Ok(FailOutcome::Exhausted)
        }
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let counts = sqlx::query_as::<_, QueueCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE state = 'waiting')::bigint AS waiting,
                COUNT(*) FILTER (WHERE state = 'active')::bigint AS active,
                COUNT(*) FILTER (WHERE state = 'completed')::bigint AS completed,
                COUNT(*) FILTER (WHERE state = 'failed')::bigint AS failed
            FROM queue_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

// ============================================================================
// In-memory backend for unit tests
// ============================================================================
