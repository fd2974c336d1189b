//! `/jobs/*` endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tradecrew_core::models::{JobKind, JobStatus};
use tradecrew_core::TradecrewError;
use uuid::Uuid;

use super::{error_body, error_to_http, json_rejection, query_rejection, respond, HttpState};
use crate::subsystems::jobs::JobService;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct AddToQueueRequest {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
}

fn parse_kind(raw: &str) -> Result<JobKind, (StatusCode, serde_json::Value)> {
    raw.trim()
        .parse::<JobKind>()
        .map_err(|e| (StatusCode::BAD_REQUEST, error_body(e)))
}

// ============================================================================
// Inner functions
// ============================================================================

/// 202 when the job went to the queue, 200 when it already ran synchronously.
pub async fn submit_job_inner(jobs: &JobService, request: SubmitJobRequest) -> (StatusCode, serde_json::Value) {
    let kind = match parse_kind(&request.kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match jobs.submit_job(kind, request.payload).await {
        Ok(job) => {
            let status = if job.status() == Some(JobStatus::Pending) {
                StatusCode::ACCEPTED
            } else {
                StatusCode::OK
            };
            match serde_json::to_value(&job) {
                Ok(body) => (status, body),
                Err(e) => error_to_http(&TradecrewError::Other(e.to_string())),
            }
        }
        Err(e) => error_to_http(&e),
    }
}

pub async fn list_jobs_inner(jobs: &JobService, params: &ListJobsParams) -> (StatusCode, serde_json::Value) {
    match jobs.list_jobs(params.status, params.limit).await {
        Ok(list) => (
            StatusCode::OK,
            serde_json::json!({ "count": list.len(), "jobs": list }),
        ),
        Err(e) => error_to_http(&e),
    }
}

pub async fn get_job_inner(jobs: &JobService, raw_id: &str) -> (StatusCode, serde_json::Value) {
    let id = match Uuid::parse_str(raw_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                error_body(format!("Invalid job id: {raw_id}")),
            )
        }
    };

    match jobs.get_job(id).await {
        Ok(job) => match serde_json::to_value(&job) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => error_to_http(&TradecrewError::Other(e.to_string())),
        },
        Err(e) => error_to_http(&e),
    }
}

pub async fn queue_stats_inner(jobs: &JobService) -> (StatusCode, serde_json::Value) {
    let stats = jobs.queue_stats().await;
    (StatusCode::OK, serde_json::json!(stats))
}

pub async fn add_to_queue_inner(jobs: &JobService, request: AddToQueueRequest) -> (StatusCode, serde_json::Value) {
    let kind = match parse_kind(&request.name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match jobs.add_to_queue(kind, request.data).await {
        Ok(queue_job_id) => (
            StatusCode::OK,
            serde_json::json!({
                "queued": queue_job_id.is_some(),
                "queueJobId": queue_job_id,
            }),
        ),
        Err(e) => error_to_http(&e),
    }
}

// ============================================================================
// Axum handlers
// ============================================================================

pub async fn submit_job_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(request)) => submit_job_inner(&state.jobs, request).await,
        Err(r) => json_rejection(r),
    })
}

pub async fn list_jobs_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<ListJobsParams>, QueryRejection>,
) -> impl IntoResponse {
    respond(match query {
        Ok(Query(params)) => list_jobs_inner(&state.jobs, &params).await,
        Err(r) => query_rejection(r),
    })
}

pub async fn get_job_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    respond(get_job_inner(&state.jobs, &id).await)
}

pub async fn queue_stats_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    respond(queue_stats_inner(&state.jobs).await)
}

pub async fn add_to_queue_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<AddToQueueRequest>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(request)) => add_to_queue_inner(&state.jobs, request).await,
        Err(r) => json_rejection(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind(" search_1688 ").unwrap(), JobKind::Search1688);
        let (status, body) = parse_kind("tiktok_scrape").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("tiktok_scrape"));
    }

    #[test]
    fn test_list_params_status_parses_snake_case() {
        let params: ListJobsParams =
            serde_json::from_value(serde_json::json!({"status": "running", "limit": 5})).unwrap();
        assert_eq!(params.status, Some(JobStatus::Running));
        assert_eq!(params.limit, Some(5));
    }
}
