//! Long-term memory subsystem
//!
//! Four record kinds share one Postgres store:
//! - **quotes**: supplier/freight prices with a validity window (factual memory)
//! - **knowledge chunks**: versioned regulations, contracts, specs (semantic memory)
//! - **conversation memories**: per-user summaries with importance (user memory)
//! - **entity relations**: supplier/product/route graph edges (graph memory)
//!
//! Writes for quotes and knowledge are "supersede, don't overwrite": the live record with
//! the same natural key is deprecated in the same transaction that inserts the new one.
//! Reads only ever see non-deprecated rows. `hybrid_search` fans out to all four kinds
//! and renders a prompt-ready context block.

mod conversation;
mod knowledge;
mod quotes;
mod relations;
mod search;
pub mod tools;

pub use knowledge::{KnowledgeQuery, SavedKnowledge};
pub use quotes::{QuoteQuery, SavedQuote};
pub use relations::{CapabilityQuery, GraphHop, SavedRelation, TraverseQuery};
pub use search::{build_context, HybridQuery, HybridResult};

use serde::Serialize;
use sqlx::PgPool;
use tradecrew_core::config::MemoryConfig;
use tradecrew_core::Result;

/// Upper bound on any list request.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for listing endpoints.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct MemoryService {
    pool: PgPool,
    config: MemoryConfig,
}

/// Row counts across the memory store.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub quotes_total: i64,
    pub quotes_active: i64,
    pub quotes_deprecated: i64,
    /// Live quotes past `valid_until` that the next prune will deprecate.
    pub quotes_expired_pending: i64,
    pub knowledge_total: i64,
    pub knowledge_active: i64,
    pub conversations: i64,
    pub relations: i64,
}

impl MemoryService {
    pub fn new(pool: PgPool, config: MemoryConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub async fn stats(&self) -> Result<MemoryStats> {
        let stats = sqlx::query_as::<_, MemoryStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM quotes)::bigint AS quotes_total,
                (SELECT COUNT(*) FROM quotes WHERE NOT is_deprecated AND valid_until > now())::bigint AS quotes_active,
                (SELECT COUNT(*) FROM quotes WHERE is_deprecated)::bigint AS quotes_deprecated,
                (SELECT COUNT(*) FROM quotes WHERE NOT is_deprecated AND valid_until <= now())::bigint AS quotes_expired_pending,
                (SELECT COUNT(*) FROM knowledge_chunks)::bigint AS knowledge_total,
                (SELECT COUNT(*) FROM knowledge_chunks WHERE NOT is_deprecated)::bigint AS knowledge_active,
                (SELECT COUNT(*) FROM conversation_memories)::bigint AS conversations,
                (SELECT COUNT(*) FROM entity_relations)::bigint AS relations
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

/// Clamp a caller-supplied limit into `1..=MAX_LIMIT`.
pub(crate) fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

/// Case-insensitive substring pattern for `ILIKE`, with LIKE wildcards escaped.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Trimmed, non-empty optional filter value.
pub(crate) fn filter_value(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
