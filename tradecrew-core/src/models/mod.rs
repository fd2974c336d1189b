pub mod conversation;
pub mod job;
pub mod knowledge;
pub mod quote;
pub mod relation;

pub use conversation::{ConversationMemory, NewConversation};
pub use job::{Job, JobKind, JobStatus};
pub use knowledge::{KnowledgeChunk, NewKnowledge};
pub use quote::{NewQuote, Quote};
pub use relation::{EntityRelation, NewRelation};

use crate::error::{Result, TradecrewError};

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TradecrewError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Trim and drop empty optional strings so `""` and `None` mean the same thing.
pub(crate) fn clean_opt(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
