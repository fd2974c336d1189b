use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_non_empty;
use crate::error::{Result, TradecrewError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelation {
    pub id: Uuid,
    pub from_type: String,
    pub from_id: String,
    pub from_name: String,
    pub relation_type: String,
    pub to_type: String,
    pub to_id: String,
    pub to_name: String,
    pub properties: serde_json::Value,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewRelation {
    pub from_type: String,
    pub from_id: String,
    pub from_name: String,
    pub relation_type: String,
    pub to_type: String,
    pub to_id: String,
    pub to_name: String,
    pub properties: Option<serde_json::Value>,
    pub confidence: Option<f64>,
}

impl NewRelation {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("fromType", &self.from_type),
            ("fromId", &self.from_id),
            ("fromName", &self.from_name),
            ("relationType", &self.relation_type),
            ("toType", &self.to_type),
            ("toId", &self.to_id),
            ("toName", &self.to_name),
        ] {
            require_non_empty(field, value)?;
        }
        let confidence = self.confidence();
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TradecrewError::validation(
                "confidence must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    pub fn confidence(&self) -> f64 {
        self.confidence.unwrap_or(1.0)
    }

    pub fn properties(&self) -> serde_json::Value {
        match &self.properties {
            Some(v) if !v.is_null() => v.clone(),
            _ => serde_json::json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn produces() -> NewRelation {
        NewRelation {
            from_type: "supplier".to_string(),
            from_id: "s-1".to_string(),
            from_name: "Shenzhen Bright Co".to_string(),
            relation_type: "produces".to_string(),
            to_type: "product".to_string(),
            to_id: "p-1".to_string(),
            to_name: "LED Strip".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_confidence_defaults_to_one() {
        assert!(produces().validate().is_ok());
        assert_eq!(produces().confidence(), 1.0);
    }

    #[test]
    fn test_rejects_confidence_out_of_range() {
        let relation = NewRelation {
            confidence: Some(1.5),
            ..produces()
        };
        assert!(relation.validate().is_err());
    }

    #[test]
    fn test_rejects_missing_endpoint() {
        let relation = NewRelation {
            to_id: String::new(),
            ..produces()
        };
        assert!(relation.validate().is_err());
    }
}
