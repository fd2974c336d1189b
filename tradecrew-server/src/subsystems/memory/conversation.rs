use tradecrew_core::models::{ConversationMemory, NewConversation};
use tradecrew_core::{Result, TradecrewError};

use super::{clamp_limit, MemoryService};

impl MemoryService {
    /// Append a conversation summary. Conversation memories are never updated.
    pub async fn save_conversation(&self, input: NewConversation) -> Result<ConversationMemory> {
        input.validate()?;

        let memory = sqlx::query_as::<_, ConversationMemory>(
            r#"
            INSERT INTO conversation_memories
                (user_id, session_id, summary, key_entities, preferences, importance)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.user_id.trim())
        .bind(input.session_id())
        .bind(input.summary.trim())
        .bind(input.key_entities())
        .bind(input.preferences())
        .bind(input.importance())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = %memory.id, user = %memory.user_id, importance = memory.importance, "Conversation memory saved");

        Ok(memory)
    }

    /// A user's memories, most important first, then most recent.
    pub async fn get_user_memory(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationMemory>> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(TradecrewError::validation("userId must not be empty"));
        }

        let memories = sqlx::query_as::<_, ConversationMemory>(
            r#"
            SELECT * FROM conversation_memories
            WHERE user_id = $1
            ORDER BY importance DESC, last_interaction DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(clamp_limit(limit, self.config.user_memory_limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(memories)
    }
}
