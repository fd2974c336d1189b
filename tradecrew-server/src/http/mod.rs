//! tradecrew HTTP REST API
//!
//! Axum server for the memory and job subsystems.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an inner
//! function returning `(StatusCode, serde_json::Value)`. The inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoint groups:
//! - `/health`, `/health/db`: public liveness and database checks
//! - `/memory/*`: quotes, knowledge, conversations, relations, hybrid search, tools
//! - `/jobs/*`: job submission, job records, queue stats
//!
//! `/memory` and `/jobs` sit behind the bearer-token guard in [`crate::auth`].

pub mod jobs;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tradecrew_core::{MarketDataProvider, TradecrewConfig, TradecrewError};

use crate::subsystems::jobs::queue::QueueService;
use crate::subsystems::jobs::JobService;
use crate::subsystems::memory::MemoryService;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub pool: PgPool,
    pub config: TradecrewConfig,
    pub memory: MemoryService,
    pub jobs: Arc<JobService>,
}

impl HttpState {
    pub fn new(
        pool: PgPool,
        config: TradecrewConfig,
        queue: Arc<QueueService>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Self {
        let memory = MemoryService::new(pool.clone(), config.memory.clone());
        let jobs = Arc::new(JobService::new(pool.clone(), queue, provider));
        Self {
            pool,
            config,
            memory,
            jobs,
        }
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let guarded = Router::new()
        .route("/memory/quote", post(memory::save_quote_handler))
        .route("/memory/quotes", get(memory::get_quotes_handler))
        .route("/memory/quotes/prune", post(memory::prune_quotes_handler))
        .route("/memory/knowledge", post(memory::save_knowledge_handler))
        .route("/memory/knowledge/search", get(memory::search_knowledge_handler))
        .route("/memory/conversation", post(memory::save_conversation_handler))
        .route("/memory/conversation/:user_id", get(memory::get_user_memory_handler))
        .route("/memory/relation", post(memory::save_relation_handler))
        .route("/memory/graph/traverse", get(memory::traverse_handler))
        .route("/memory/suppliers/capability", get(memory::capability_handler))
        .route("/memory/search/hybrid", post(memory::hybrid_search_handler))
        .route("/memory/stats", get(memory::stats_handler))
        .route("/memory/tools", get(memory::list_tools_handler))
        .route("/memory/tools/:name", post(memory::execute_tool_handler))
        .route("/jobs", post(jobs::submit_job_handler).get(jobs::list_jobs_handler))
        .route("/jobs/queue/stats", get(jobs::queue_stats_handler))
        .route("/jobs/queue/add", post(jobs::add_to_queue_handler))
        .route("/jobs/:id", get(jobs::get_job_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/db", get(health_db_handler))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.http.cors_origin))
        .with_state(state)
}

/// CORS for the dashboard origin. `*` allows any origin.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origin.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origin
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("CORS: invalid origin '{}' skipped", o);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("tradecrew HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Response helpers
// ============================================================================

pub fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": message.into(),
        "status": "error",
    })
}

/// Map a service error to a response. Internal failures are logged with their
/// cause and answered with a generic message.
pub fn error_to_http(err: &TradecrewError) -> (StatusCode, serde_json::Value) {
    match err {
        TradecrewError::Validation(msg) => (StatusCode::BAD_REQUEST, error_body(msg.clone())),
        TradecrewError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(format!("Not found: {msg}"))),
        other => {
            tracing::error!(error = %other, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Internal server error"))
        }
    }
}

/// Serialize a successful result with `status`, or map the error.
pub fn result_to_http<T: Serialize>(
    status: StatusCode,
    result: tradecrew_core::Result<T>,
) -> (StatusCode, serde_json::Value) {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(body) => (status, body),
            Err(e) => error_to_http(&TradecrewError::Other(e.to_string())),
        },
        Err(e) => error_to_http(&e),
    }
}

/// Reject a malformed JSON body with 400 and the standard error body.
pub fn json_rejection(rejection: JsonRejection) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        error_body(format!("Invalid JSON body: {}", rejection.body_text())),
    )
}

pub fn query_rejection(rejection: QueryRejection) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        error_body(format!("Invalid query string: {}", rejection.body_text())),
    )
}

pub(crate) fn respond((status, body): (StatusCode, serde_json::Value)) -> impl IntoResponse {
    (status, Json(body))
}

// ============================================================================
// Health
// ============================================================================

/// Inner health check: process liveness plus queue availability. No DB round-trip.
pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.service.environment,
            "queue": state.jobs.queue().is_available(),
        }),
    )
}

/// Inner DB health: queries Postgres and reports version and latency.
pub async fn health_db_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    let version = match tradecrew_core::db::health_check(pool).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": "database unavailable",
                }),
            );
        }
    };

    let latency_ms = tradecrew_core::db::ping(pool).await.ok();

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "postgresql": version,
            "latencyMs": latency_ms,
        }),
    )
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    respond(health_inner(&state).await)
}

pub async fn health_db_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    respond(health_db_inner(&state.pool).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_http_status_mapping() {
        let (status, body) = error_to_http(&TradecrewError::validation("price must be a non-negative number"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "price must be a non-negative number");

        let (status, _) = error_to_http(&TradecrewError::NotFound("job 1".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let (status, body) = error_to_http(&TradecrewError::Other("connection refused at 10.0.0.5".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn test_result_to_http_ok() {
        let (status, body) = result_to_http(StatusCode::CREATED, Ok(serde_json::json!({"id": 1})));
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);
    }

    #[test]
    fn test_cors_layer_accepts_list_and_wildcard() {
        // Construction must not panic for any of these inputs.
        let _ = cors_layer("*");
        let _ = cors_layer("http://localhost:5173, https://dash.example.com");
        let _ = cors_layer("");
    }
}
