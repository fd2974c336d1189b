use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clean_opt, require_non_empty};
use crate::error::{Result, TradecrewError};

pub const KNOWLEDGE_CATEGORIES: &[&str] = &["regulation", "contract", "spec", "logistics", "other"];

pub const DEFAULT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeChunk {
    pub id: Uuid,
    pub category: String,
    pub country: Option<String>,
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub version: String,
    pub tags: Vec<String>,
    pub is_deprecated: bool,
    pub superseded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewKnowledge {
    pub category: String,
    pub country: Option<String>,
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewKnowledge {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_non_empty("content", &self.content)?;
        if !KNOWLEDGE_CATEGORIES.contains(&self.category.trim()) {
            return Err(TradecrewError::validation(format!(
                "category must be one of {}",
                KNOWLEDGE_CATEGORIES.join(", ")
            )));
        }
        Ok(())
    }

    pub fn country(&self) -> Option<String> {
        clean_opt(&self.country).map(|c| c.to_ascii_uppercase())
    }

    pub fn version(&self) -> String {
        clean_opt(&self.version).unwrap_or_else(|| DEFAULT_VERSION.to_string())
    }

    pub fn natural_key(&self) -> String {
        format!(
            "knowledge:{}:{}:{}",
            self.title.trim(),
            self.category.trim(),
            self.country().unwrap_or_default()
        )
    }
}

/// Value stored in `superseded_by` on the chunk a newer chunk replaced.
pub fn superseded_marker(new_id: Uuid, new_version: &str) -> String {
    format!("{new_id} (version {new_version})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us_regulation() -> NewKnowledge {
        NewKnowledge {
            category: "regulation".to_string(),
            country: Some("us".to_string()),
            title: "FCC Part 15".to_string(),
            content: "Unintentional radiators must be tested.".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_version_and_normalizes_country() {
        let chunk = us_regulation();
        assert!(chunk.validate().is_ok());
        assert_eq!(chunk.version(), "1.0");
        assert_eq!(chunk.country().as_deref(), Some("US"));
    }

    #[test]
    fn test_rejects_unknown_category() {
        for category in ["gossip", "tariff"] {
            let chunk = NewKnowledge {
                category: category.to_string(),
                ..us_regulation()
            };
            assert!(chunk.validate().is_err(), "category {category} should be rejected");
        }
    }

    #[test]
    fn test_rejects_empty_content() {
        let chunk = NewKnowledge {
            content: "   ".to_string(),
            ..us_regulation()
        };
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn test_superseded_marker_names_version() {
        let id = Uuid::new_v4();
        let marker = superseded_marker(id, "2.0");
        assert!(marker.contains("2.0"));
        assert!(marker.starts_with(&id.to_string()));
    }
}
