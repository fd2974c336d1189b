//! `/memory/*` endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tradecrew_core::models::{NewConversation, NewKnowledge, NewQuote, NewRelation};

use super::{error_to_http, json_rejection, query_rejection, respond, result_to_http, HttpState};
use crate::subsystems::memory::tools::{execute_tool, tool_definitions};
use crate::subsystems::memory::{
    CapabilityQuery, HybridQuery, KnowledgeQuery, MemoryService, QuoteQuery, TraverseQuery,
};

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

// ============================================================================
// Inner functions
// ============================================================================

pub async fn save_quote_inner(memory: &MemoryService, input: NewQuote) -> (StatusCode, serde_json::Value) {
    result_to_http(StatusCode::CREATED, memory.save_quote(input).await)
}

pub async fn get_quotes_inner(memory: &MemoryService, query: &QuoteQuery) -> (StatusCode, serde_json::Value) {
    match memory.get_quotes(query).await {
        Ok(quotes) => (
            StatusCode::OK,
            serde_json::json!({ "count": quotes.len(), "quotes": quotes }),
        ),
        Err(e) => error_to_http(&e),
    }
}

pub async fn prune_quotes_inner(memory: &MemoryService) -> (StatusCode, serde_json::Value) {
    match memory.prune_expired_quotes().await {
        Ok(pruned) => (StatusCode::OK, serde_json::json!({ "pruned": pruned })),
        Err(e) => error_to_http(&e),
    }
}

pub async fn save_knowledge_inner(memory: &MemoryService, input: NewKnowledge) -> (StatusCode, serde_json::Value) {
    result_to_http(StatusCode::CREATED, memory.save_knowledge(input).await)
}

pub async fn search_knowledge_inner(
    memory: &MemoryService,
    query: &KnowledgeQuery,
) -> (StatusCode, serde_json::Value) {
    match memory.search_knowledge(query).await {
        Ok(chunks) => (
            StatusCode::OK,
            serde_json::json!({ "count": chunks.len(), "chunks": chunks }),
        ),
        Err(e) => error_to_http(&e),
    }
}

pub async fn save_conversation_inner(
    memory: &MemoryService,
    input: NewConversation,
) -> (StatusCode, serde_json::Value) {
    result_to_http(StatusCode::CREATED, memory.save_conversation(input).await)
}

pub async fn get_user_memory_inner(
    memory: &MemoryService,
    user_id: &str,
    limit: Option<i64>,
) -> (StatusCode, serde_json::Value) {
    match memory.get_user_memory(user_id, limit).await {
        Ok(memories) => (
            StatusCode::OK,
            serde_json::json!({
                "userId": user_id,
                "count": memories.len(),
                "memories": memories,
            }),
        ),
        Err(e) => error_to_http(&e),
    }
}

/// 201 for a new edge, 200 when an existing edge was refreshed.
pub async fn save_relation_inner(memory: &MemoryService, input: NewRelation) -> (StatusCode, serde_json::Value) {
    match memory.save_relation(input).await {
        Ok(saved) => {
            let status = if saved.created { StatusCode::CREATED } else { StatusCode::OK };
            result_to_http(status, Ok(saved))
        }
        Err(e) => error_to_http(&e),
    }
}

pub async fn traverse_inner(memory: &MemoryService, query: &TraverseQuery) -> (StatusCode, serde_json::Value) {
    match memory.traverse(query).await {
        Ok(hops) => (
            StatusCode::OK,
            serde_json::json!({ "count": hops.len(), "relations": hops }),
        ),
        Err(e) => error_to_http(&e),
    }
}

pub async fn capability_inner(memory: &MemoryService, query: &CapabilityQuery) -> (StatusCode, serde_json::Value) {
    match memory.find_suppliers_by_capability(query).await {
        Ok(suppliers) => (
            StatusCode::OK,
            serde_json::json!({ "count": suppliers.len(), "suppliers": suppliers }),
        ),
        Err(e) => error_to_http(&e),
    }
}

pub async fn hybrid_search_inner(memory: &MemoryService, query: &HybridQuery) -> (StatusCode, serde_json::Value) {
    result_to_http(StatusCode::OK, memory.hybrid_search(query).await)
}

pub async fn stats_inner(memory: &MemoryService) -> (StatusCode, serde_json::Value) {
    result_to_http(StatusCode::OK, memory.stats().await)
}

pub fn list_tools_inner() -> (StatusCode, serde_json::Value) {
    let tools = tool_definitions();
    (
        StatusCode::OK,
        serde_json::json!({ "count": tools.len(), "tools": tools }),
    )
}

pub async fn execute_tool_inner(
    memory: &MemoryService,
    name: &str,
    args: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    match execute_tool(memory, name, args).await {
        Ok(result) => (StatusCode::OK, serde_json::json!({ "tool": name, "result": result })),
        Err(e) => error_to_http(&e),
    }
}

// ============================================================================
// Axum handlers
// ============================================================================

pub async fn save_quote_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<NewQuote>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(input)) => save_quote_inner(&state.memory, input).await,
        Err(r) => json_rejection(r),
    })
}

pub async fn get_quotes_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<QuoteQuery>, QueryRejection>,
) -> impl IntoResponse {
    respond(match query {
        Ok(Query(q)) => get_quotes_inner(&state.memory, &q).await,
        Err(r) => query_rejection(r),
    })
}

pub async fn prune_quotes_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    respond(prune_quotes_inner(&state.memory).await)
}

pub async fn save_knowledge_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<NewKnowledge>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(input)) => save_knowledge_inner(&state.memory, input).await,
        Err(r) => json_rejection(r),
    })
}

pub async fn search_knowledge_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<KnowledgeQuery>, QueryRejection>,
) -> impl IntoResponse {
    respond(match query {
        Ok(Query(q)) => search_knowledge_inner(&state.memory, &q).await,
        Err(r) => query_rejection(r),
    })
}

pub async fn save_conversation_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<NewConversation>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(input)) => save_conversation_inner(&state.memory, input).await,
        Err(r) => json_rejection(r),
    })
}

pub async fn get_user_memory_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
    query: Result<Query<LimitParams>, QueryRejection>,
) -> impl IntoResponse {
    respond(match query {
        Ok(Query(q)) => get_user_memory_inner(&state.memory, &user_id, q.limit).await,
        Err(r) => query_rejection(r),
    })
}

pub async fn save_relation_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<NewRelation>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(input)) => save_relation_inner(&state.memory, input).await,
        Err(r) => json_rejection(r),
    })
}

pub async fn traverse_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<TraverseQuery>, QueryRejection>,
) -> impl IntoResponse {
    respond(match query {
        Ok(Query(q)) => traverse_inner(&state.memory, &q).await,
        Err(r) => query_rejection(r),
    })
}

pub async fn capability_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<CapabilityQuery>, QueryRejection>,
) -> impl IntoResponse {
    respond(match query {
        Ok(Query(q)) => capability_inner(&state.memory, &q).await,
        Err(r) => query_rejection(r),
    })
}

pub async fn hybrid_search_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<HybridQuery>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(q)) => hybrid_search_inner(&state.memory, &q).await,
        Err(r) => json_rejection(r),
    })
}

pub async fn stats_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    respond(stats_inner(&state.memory).await)
}

pub async fn list_tools_handler() -> impl IntoResponse {
    respond(list_tools_inner())
}

pub async fn execute_tool_handler(
    State(state): State<Arc<HttpState>>,
    Path(name): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    respond(match body {
        Ok(Json(args)) => execute_tool_inner(&state.memory, &name, args).await,
        Err(r) => json_rejection(r),
    })
}
