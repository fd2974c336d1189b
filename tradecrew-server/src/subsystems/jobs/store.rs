//! Job records in the `jobs` table.
//!
//! Every status change is a guarded `UPDATE ... WHERE status = ANY(sources)`, so a
//! record never leaves `completed` or `failed` and never moves back to `pending`.
//! A transition that does not apply returns `Ok(None)`.

use sqlx::PgPool;
use tradecrew_core::models::{Job, JobKind, JobStatus};
use tradecrew_core::Result;
use uuid::Uuid;

use crate::subsystems::memory::{DEFAULT_LIST_LIMIT, MAX_LIMIT};

pub async fn create_job(pool: &PgPool, kind: JobKind, payload: &serde_json::Value) -> Result<Job> {
    let job = sqlx::query_as::<_, Job>(
        "INSERT INTO jobs (kind, payload) VALUES ($1, $2) RETURNING *",
    )
    .bind(kind.as_str())
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(job)
}

pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(job)
}

/// Newest first, optionally filtered by status.
pub async fn list_jobs(pool: &PgPool, status: Option<JobStatus>, limit: Option<i64>) -> Result<Vec<Job>> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIMIT);

    let jobs = sqlx::query_as::<_, Job>(
        r#"
        SELECT * FROM jobs
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(jobs)
}

/// Start an attempt: `pending|running → running`, counting the attempt.
pub async fn mark_running(pool: &PgPool, id: Uuid) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'running',
            started_at = COALESCE(started_at, now()),
            attempts = attempts + 1
        WHERE id = $1 AND status = ANY($2)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(JobStatus::sources_of(JobStatus::Running))
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

pub async fn mark_completed(pool: &PgPool, id: Uuid, result: &serde_json::Value) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'completed', result = $2, error = NULL, finished_at = now()
        WHERE id = $1 AND status = ANY($3)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(result)
    .bind(JobStatus::sources_of(JobStatus::Completed))
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'failed', error = $2, finished_at = now()
        WHERE id = $1 AND status = ANY($3)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(JobStatus::sources_of(JobStatus::Failed))
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

/// Record the error of a failed attempt that the queue will retry. Status stays `running`.
pub async fn record_retry_error(pool: &PgPool, id: Uuid, error: &str) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        "UPDATE jobs SET error = $2 WHERE id = $1 AND status = 'running' RETURNING *",
    )
    .bind(id)
    .bind(error)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

pub async fn attach_queue_id(pool: &PgPool, id: Uuid, queue_job_id: i64) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        "UPDATE jobs SET queue_job_id = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(queue_job_id)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}
