use serde::{Deserialize, Serialize};
use tradecrew_core::models::knowledge::superseded_marker;
use tradecrew_core::models::{KnowledgeChunk, NewKnowledge};
use tradecrew_core::Result;
use uuid::Uuid;

use super::{clamp_limit, contains_pattern, filter_value, MemoryService};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedKnowledge {
    pub chunk: KnowledgeChunk,
    pub superseded: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeQuery {
    /// Matched case-insensitively against title or content.
    pub query: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub limit: Option<i64>,
}

impl MemoryService {
    /// Store a knowledge chunk. A live chunk with the same title, category and country
    /// but a different version is deprecated and pointed at the new chunk through
    /// `superseded_by`. Re-saving the same version leaves existing chunks live.
    pub async fn save_knowledge(&self, input: NewKnowledge) -> Result<SavedKnowledge> {
        input.validate()?;

        let id = Uuid::new_v4();
        let version = input.version();
        let country = input.country();
        let title = input.title.trim();
        let category = input.category.trim();

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(input.natural_key())
            .execute(&mut *tx)
            .await?;

        let superseded = sqlx::query(
            r#"
            UPDATE knowledge_chunks
            SET is_deprecated = true, superseded_by = $4, updated_at = now()
            WHERE NOT is_deprecated
              AND title = $1
              AND category = $2
              AND country IS NOT DISTINCT FROM $3
              AND version <> $5
            "#,
        )
        .bind(title)
        .bind(category)
        .bind(&country)
        .bind(superseded_marker(id, &version))
        .bind(&version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let tags: Vec<String> = input
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let chunk = sqlx::query_as::<_, KnowledgeChunk>(
            r#"
            INSERT INTO knowledge_chunks
                (id, category, country, title, content, source, version, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(category)
        .bind(&country)
        .bind(title)
        .bind(input.content.trim())
        .bind(filter_value(&input.source))
        .bind(&version)
        .bind(&tags)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            id = %chunk.id,
            title = %chunk.title,
            version = %chunk.version,
            superseded,
            "Knowledge chunk saved"
        );

        Ok(SavedKnowledge { chunk, superseded })
    }

    /// Live knowledge chunks matching the filters, newest first.
    pub async fn search_knowledge(&self, query: &KnowledgeQuery) -> Result<Vec<KnowledgeChunk>> {
        let limit = clamp_limit(query.limit, self.config.knowledge_limit);

        let chunks = sqlx::query_as::<_, KnowledgeChunk>(
            r#"
            SELECT * FROM knowledge_chunks
            WHERE NOT is_deprecated
              AND ($1::text IS NULL OR title ILIKE $1 OR content ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR country = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(filter_value(&query.query).map(contains_pattern))
        .bind(filter_value(&query.category))
        .bind(filter_value(&query.country).map(str::to_ascii_uppercase))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }
}
