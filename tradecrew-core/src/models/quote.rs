use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clean_opt, require_non_empty};
use crate::error::{Result, TradecrewError};

pub const QUOTE_ITEM_TYPES: &[&str] = &["product", "freight", "service"];

/// Longest validity window a quote may carry (ten years).
pub const MAX_VALIDITY_DAYS: i64 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    pub item_type: String,
    pub item_name: String,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub price: f64,
    pub currency: String,
    pub unit: Option<String>,
    pub min_order_qty: Option<i32>,
    pub route: Option<String>,
    pub terms: Option<String>,
    pub source: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_deprecated: bool,
    pub created_at: DateTime<Utc>,
}

/// Incoming quote. `validity_days` falls back to the configured default.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewQuote {
    pub item_type: String,
    pub item_name: String,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub price: f64,
    pub currency: Option<String>,
    pub unit: Option<String>,
    pub min_order_qty: Option<i32>,
    pub route: Option<String>,
    pub terms: Option<String>,
    pub source: Option<String>,
    pub validity_days: Option<i64>,
}

impl NewQuote {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("itemName", &self.item_name)?;
        if !QUOTE_ITEM_TYPES.contains(&self.item_type.trim()) {
            return Err(TradecrewError::validation(format!(
                "itemType must be one of {}",
                QUOTE_ITEM_TYPES.join(", ")
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(TradecrewError::validation("price must be a non-negative number"));
        }
        let currency = self.currency();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TradecrewError::validation("currency must be a 3-letter code"));
        }
        if let Some(days) = self.validity_days {
            if !(1..=MAX_VALIDITY_DAYS).contains(&days) {
                return Err(TradecrewError::validation(format!(
                    "validityDays must be between 1 and {MAX_VALIDITY_DAYS}"
                )));
            }
        }
        if matches!(self.min_order_qty, Some(q) if q < 0) {
            return Err(TradecrewError::validation("minOrderQty must not be negative"));
        }
        Ok(())
    }

    pub fn currency(&self) -> String {
        self.currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("USD")
            .to_ascii_uppercase()
    }

    pub fn supplier_id(&self) -> Option<String> {
        clean_opt(&self.supplier_id)
    }

    pub fn route(&self) -> Option<String> {
        clean_opt(&self.route).map(|r| r.to_ascii_uppercase())
    }

    /// The window is clamped to `1..=MAX_VALIDITY_DAYS`, so a misconfigured
    /// default cannot overflow the timestamp.
    pub fn valid_until(&self, now: DateTime<Utc>, default_days: i64) -> DateTime<Utc> {
        let days = self.validity_days.unwrap_or(default_days).clamp(1, MAX_VALIDITY_DAYS);
        now + Duration::days(days)
    }

    /// Natural key identifying "the same" quote across writes.
    pub fn natural_key(&self) -> String {
        format!(
            "quote:{}:{}:{}",
            self.supplier_id().unwrap_or_default(),
            self.item_name.trim(),
            self.item_type.trim()
        )
    }
}
