use chrono::Utc;
use serde::{Deserialize, Serialize};
use tradecrew_core::models::{NewQuote, Quote};
use tradecrew_core::Result;

use super::{clamp_limit, contains_pattern, filter_value, MemoryService, DEFAULT_LIST_LIMIT};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuote {
    pub quote: Quote,
    /// Live quotes with the same natural key that this write deprecated.
    pub superseded: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub item_type: Option<String>,
    pub item_name: Option<String>,
    pub route: Option<String>,
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub include_expired: bool,
    pub limit: Option<i64>,
}

impl MemoryService {
    /// Store a quote, deprecating any live quote for the same supplier, item and type.
    ///
    /// The deprecate + insert pair runs in one transaction under an advisory lock on
    /// the natural key, so concurrent writers for the same key cannot both stay live.
    pub async fn save_quote(&self, input: NewQuote) -> Result<SavedQuote> {
        input.validate()?;

        let now = Utc::now();
        let supplier_id = input.supplier_id();
        let item_name = input.item_name.trim();
        let item_type = input.item_type.trim();

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(input.natural_key())
            .execute(&mut *tx)
            .await?;

        let superseded = sqlx::query(
            r#"
            UPDATE quotes
            SET is_deprecated = true
            WHERE NOT is_deprecated
              AND supplier_id IS NOT DISTINCT FROM $1
              AND item_name = $2
              AND item_type = $3
            "#,
        )
        .bind(&supplier_id)
        .bind(item_name)
        .bind(item_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            INSERT INTO quotes
                (item_type, item_name, supplier_id, supplier_name, price, currency, unit,
                 min_order_qty, route, terms, source, valid_from, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(item_type)
        .bind(item_name)
        .bind(&supplier_id)
        .bind(filter_value(&input.supplier_name))
        .bind(input.price)
        .bind(input.currency())
        .bind(filter_value(&input.unit))
        .bind(input.min_order_qty)
        .bind(input.route())
        .bind(filter_value(&input.terms))
        .bind(filter_value(&input.source))
        .bind(now)
        .bind(input.valid_until(now, self.config.default_quote_validity_days))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            id = %quote.id,
            item = %quote.item_name,
            supplier = quote.supplier_id.as_deref().unwrap_or("-"),
            superseded,
            "Quote saved"
        );

        Ok(SavedQuote { quote, superseded })
    }

    /// Live quotes matching the filters, cheapest first.
    pub async fn get_quotes(&self, query: &QuoteQuery) -> Result<Vec<Quote>> {
        let limit = clamp_limit(query.limit, DEFAULT_LIST_LIMIT);

        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT * FROM quotes
            WHERE NOT is_deprecated
              AND ($1::text IS NULL OR item_type = $1)
              AND ($2::text IS NULL OR item_name ILIKE $2)
              AND ($3::text IS NULL OR route ILIKE $3)
              AND ($4::text IS NULL OR supplier_id = $4)
              AND ($5 OR valid_until > now())
            ORDER BY price ASC, created_at DESC
            LIMIT $6
            "#,
        )
        .bind(filter_value(&query.item_type))
        .bind(filter_value(&query.item_name).map(contains_pattern))
        .bind(filter_value(&query.route).map(contains_pattern))
        .bind(filter_value(&query.supplier_id))
        .bind(query.include_expired)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(quotes)
    }

    /// Deprecate every live quote whose validity window has closed.
    /// Returns the number of quotes deprecated; a second run right after returns 0.
    pub async fn prune_expired_quotes(&self) -> Result<u64> {
        let pruned = sqlx::query(
            "UPDATE quotes SET is_deprecated = true WHERE NOT is_deprecated AND valid_until <= now()",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        if pruned > 0 {
            tracing::info!(pruned, "Expired quotes deprecated");
        } else {
            tracing::debug!("No expired quotes to prune");
        }

        Ok(pruned)
    }
}
