use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clean_opt, require_non_empty};
use crate::error::Result;

pub const MIN_IMPORTANCE: i32 = 1;
pub const MAX_IMPORTANCE: i32 = 10;
pub const DEFAULT_IMPORTANCE: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMemory {
    pub id: Uuid,
    pub user_id: String,
    pub session_id: Option<String>,
    pub summary: String,
    pub key_entities: serde_json::Value,
    pub preferences: serde_json::Value,
    pub importance: i32,
    pub last_interaction: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub user_id: String,
    pub session_id: Option<String>,
    pub summary: String,
    pub key_entities: Option<serde_json::Value>,
    pub preferences: Option<serde_json::Value>,
    pub importance: Option<i32>,
}

impl NewConversation {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("userId", &self.user_id)?;
        require_non_empty("summary", &self.summary)
    }

    pub fn importance(&self) -> i32 {
        self.importance
            .unwrap_or(DEFAULT_IMPORTANCE)
            .clamp(MIN_IMPORTANCE, MAX_IMPORTANCE)
    }

    pub fn session_id(&self) -> Option<String> {
        clean_opt(&self.session_id)
    }

    pub fn key_entities(&self) -> serde_json::Value {
        object_or_empty(self.key_entities.as_ref())
    }

    pub fn preferences(&self) -> serde_json::Value {
        object_or_empty(self.preferences.as_ref())
    }
}

fn object_or_empty(value: Option<&serde_json::Value>) -> serde_json::Value {
    match value {
        Some(v) if !v.is_null() => v.clone(),
        _ => serde_json::json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_is_clamped() {
        let mut input = NewConversation {
            user_id: "u1".to_string(),
            summary: "Prefers DDP shipping to Germany".to_string(),
            ..Default::default()
        };
        assert_eq!(input.importance(), DEFAULT_IMPORTANCE);

        input.importance = Some(42);
        assert_eq!(input.importance(), 10);

        input.importance = Some(-3);
        assert_eq!(input.importance(), 1);
    }

    #[test]
    fn test_null_maps_become_empty_objects() {
        let input = NewConversation {
            user_id: "u1".to_string(),
            summary: "s".to_string(),
            preferences: Some(serde_json::Value::Null),
            ..Default::default()
        };
        assert_eq!(input.preferences(), serde_json::json!({}));
        assert_eq!(input.key_entities(), serde_json::json!({}));
    }

    #[test]
    fn test_requires_user_id() {
        let input = NewConversation {
            summary: "s".to_string(),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }
}
