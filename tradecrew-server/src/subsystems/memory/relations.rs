use serde::{Deserialize, Serialize};
use tradecrew_core::models::{EntityRelation, NewRelation};
use tradecrew_core::{Result, TradecrewError};

use super::{clamp_limit, contains_pattern, filter_value, MemoryService};

/// Traversal depth bounds.
pub const MIN_DEPTH: i32 = 1;
pub const MAX_DEPTH: i32 = 3;
pub const DEFAULT_DEPTH: i32 = 2;

/// Relation types that mark a supplier as able to deliver a product.
const CAPABILITY_RELATIONS: &[&str] = &["produces", "supplies"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRelation {
    pub relation: EntityRelation,
    /// `false` when an existing edge was updated in place.
    pub created: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraverseQuery {
    pub from_type: String,
    pub from_id: String,
    pub relation_type: Option<String>,
    pub max_depth: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityQuery {
    pub product: String,
    pub min_confidence: Option<f64>,
    pub limit: Option<i64>,
}

/// One edge reached by a traversal, with its distance from the start node.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GraphHop {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub relation: EntityRelation,
    pub depth: i32,
}

#[derive(sqlx::FromRow)]
struct UpsertedRelation {
    #[sqlx(flatten)]
    relation: EntityRelation,
    inserted: bool,
}

impl MemoryService {
    /// Insert an edge, or refresh names, properties and confidence of the existing one.
    pub async fn save_relation(&self, input: NewRelation) -> Result<SavedRelation> {
        input.validate()?;

        let row = sqlx::query_as::<_, UpsertedRelation>(
            r#"
            INSERT INTO entity_relations
                (from_type, from_id, from_name, relation_type, to_type, to_id, to_name,
                 properties, confidence)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (from_type, from_id, relation_type, to_type, to_id)
            DO UPDATE SET
                from_name = EXCLUDED.from_name,
                to_name = EXCLUDED.to_name,
                properties = EXCLUDED.properties,
                confidence = EXCLUDED.confidence,
                updated_at = now()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(input.from_type.trim())
        .bind(input.from_id.trim())
        .bind(input.from_name.trim())
        .bind(input.relation_type.trim())
        .bind(input.to_type.trim())
        .bind(input.to_id.trim())
        .bind(input.to_name.trim())
        .bind(input.properties())
        .bind(input.confidence())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            id = %row.relation.id,
            relation = %row.relation.relation_type,
            created = row.inserted,
            "Relation saved"
        );

        Ok(SavedRelation {
            relation: row.relation,
            created: row.inserted,
        })
    }

    /// Edges whose source or target name contains `term`, most confident first.
    pub async fn find_relations(&self, term: &str, limit: Option<i64>) -> Result<Vec<EntityRelation>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let relations = sqlx::query_as::<_, EntityRelation>(
            r#"
            SELECT * FROM entity_relations
            WHERE from_name ILIKE $1 OR to_name ILIKE $1
            ORDER BY confidence DESC, updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(contains_pattern(term))
        .bind(clamp_limit(limit, self.config.relation_limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(relations)
    }

    /// Walk outgoing edges from a node up to `max_depth` hops. Nodes already on the
    /// current path are not revisited, so cycles terminate.
    pub async fn traverse(&self, query: &TraverseQuery) -> Result<Vec<GraphHop>> {
        let from_type = query.from_type.trim();
        let from_id = query.from_id.trim();
        if from_type.is_empty() || from_id.is_empty() {
            return Err(TradecrewError::validation("fromType and fromId are required"));
        }
        let depth = query.max_depth.unwrap_or(DEFAULT_DEPTH);
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(TradecrewError::validation(format!(
                "maxDepth must be between {MIN_DEPTH} and {MAX_DEPTH}"
            )));
        }

        let hops = sqlx::query_as::<_, GraphHop>(
            r#"
            WITH RECURSIVE walk AS (
                SELECT r.*, 1 AS depth,
                       ARRAY[r.from_type || ':' || r.from_id, r.to_type || ':' || r.to_id] AS path
                FROM entity_relations r
                WHERE r.from_type = $1 AND r.from_id = $2
                  AND ($3::text IS NULL OR r.relation_type = $3)
                UNION ALL
                SELECT r.*, w.depth + 1,
                       w.path || (r.to_type || ':' || r.to_id)
                FROM entity_relations r
                JOIN walk w ON r.from_type = w.to_type AND r.from_id = w.to_id
                WHERE w.depth < $4
                  AND ($3::text IS NULL OR r.relation_type = $3)
                  AND NOT ((r.to_type || ':' || r.to_id) = ANY(w.path))
            )
            SELECT id, from_type, from_id, from_name, relation_type, to_type, to_id, to_name,
                   properties, confidence, created_at, updated_at, depth
            FROM walk
            ORDER BY depth ASC, confidence DESC
            "#,
        )
        .bind(from_type)
        .bind(from_id)
        .bind(filter_value(&query.relation_type))
        .bind(depth)
        .fetch_all(&self.pool)
        .await?;

        Ok(hops)
    }

    /// Suppliers linked to a product by a `produces`/`supplies` edge.
    pub async fn find_suppliers_by_capability(
        &self,
        query: &CapabilityQuery,
    ) -> Result<Vec<EntityRelation>> {
        let product = query.product.trim();
        if product.is_empty() {
            return Err(TradecrewError::validation("product must not be empty"));
        }
        let min_confidence = query.min_confidence.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(TradecrewError::validation(
                "minConfidence must be between 0.0 and 1.0",
            ));
        }

        let relations = sqlx::query_as::<_, EntityRelation>(
            r#"
            SELECT * FROM entity_relations
            WHERE from_type = 'supplier'
              AND relation_type = ANY($1)
              AND to_name ILIKE $2
              AND confidence >= $3
            ORDER BY confidence DESC, updated_at DESC
            LIMIT $4
            "#,
        )
        .bind(CAPABILITY_RELATIONS)
        .bind(contains_pattern(product))
        .bind(min_confidence)
        .bind(clamp_limit(query.limit, self.config.relation_limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(relations)
    }
}
