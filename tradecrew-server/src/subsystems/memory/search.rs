//! Hybrid retrieval across the four memory kinds.
//!
//! The four lookups are independent and run concurrently. Their rows are rendered
//! into one text block in a fixed section order: factual → semantic → graph → user.

use serde::{Deserialize, Serialize};
use tradecrew_core::models::{ConversationMemory, EntityRelation, KnowledgeChunk, Quote};
use tradecrew_core::{Result, TradecrewError};

use super::{filter_value, KnowledgeQuery, MemoryService, QuoteQuery};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridQuery {
    pub query: String,
    pub country: Option<String>,
    pub route: Option<String>,
    /// Graph lookup term; the free-text query is used when absent.
    pub product_type: Option<String>,
    pub user_id: Option<String>,
    /// Per-section cap; each section uses its configured limit when absent.
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridResult {
    pub factual: Vec<Quote>,
    pub semantic: Vec<KnowledgeChunk>,
    pub graph: Vec<EntityRelation>,
    pub user: Vec<ConversationMemory>,
    pub context: String,
}

impl MemoryService {
    pub async fn hybrid_search(&self, query: &HybridQuery) -> Result<HybridResult> {
        let text = query.query.trim();
        if text.is_empty() {
            return Err(TradecrewError::validation("query must not be empty"));
        }

        let quote_query = QuoteQuery {
            route: query.route.clone(),
            limit: Some(query.limit.unwrap_or(self.config.quote_limit)),
            ..Default::default()
        };
        let knowledge_query = KnowledgeQuery {
            query: Some(text.to_string()),
            country: query.country.clone(),
            limit: Some(query.limit.unwrap_or(self.config.knowledge_limit)),
            ..Default::default()
        };
        let graph_term = filter_value(&query.product_type).unwrap_or(text);
        let relation_limit = Some(query.limit.unwrap_or(self.config.relation_limit));
        let user_id = filter_value(&query.user_id);

        let (factual, semantic, graph, user) = tokio::try_join!(
            self.get_quotes(&quote_query),
            self.search_knowledge(&knowledge_query),
            self.find_relations(graph_term, relation_limit),
            async {
                match user_id {
                    Some(id) => {
                        self.get_user_memory(id, Some(query.limit.unwrap_or(self.config.user_memory_limit)))
                            .await
                    }
                    None => Ok(Vec::new()),
                }
            },
        )?;

        let context = build_context(&factual, &semantic, &graph, &user, self.config.snippet_chars);

        tracing::debug!(
            factual = factual.len(),
            semantic = semantic.len(),
            graph = graph.len(),
            user = user.len(),
            "Hybrid search complete"
        );

        Ok(HybridResult {
            factual,
            semantic,
            graph,
            user,
            context,
        })
    }
}

/// Render retrieval rows as prompt context. Empty sections are left out; an empty
/// string means nothing was found.
pub fn build_context(
    factual: &[Quote],
    semantic: &[KnowledgeChunk],
    graph: &[EntityRelation],
    user: &[ConversationMemory],
    snippet_chars: usize,
) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(4);

    if !factual.is_empty() {
        let lines: Vec<String> = factual.iter().map(quote_line).collect();
        sections.push(format!("## Supplier quotes\n{}", lines.join("\n")));
    }
    if !semantic.is_empty() {
        let lines: Vec<String> = semantic
            .iter()
            .map(|c| knowledge_line(c, snippet_chars))
            .collect();
        sections.push(format!("## Regulations and knowledge\n{}", lines.join("\n")));
    }
    if !graph.is_empty() {
        let lines: Vec<String> = graph.iter().map(relation_line).collect();
        sections.push(format!("## Known relationships\n{}", lines.join("\n")));
    }
    if !user.is_empty() {
        let lines: Vec<String> = user.iter().map(user_line).collect();
        sections.push(format!("## User history\n{}", lines.join("\n")));
    }

    sections.join("\n\n")
}

fn quote_line(q: &Quote) -> String {
    let supplier = q
        .supplier_name
        .as_deref()
        .or(q.supplier_id.as_deref())
        .unwrap_or("unknown supplier");
    let mut line = format!(
        "- {} ({}) from {}: {:.2} {}",
        q.item_name, q.item_type, supplier, q.price, q.currency
    );
    if let Some(unit) = &q.unit {
        line.push_str(&format!("/{unit}"));
    }
    if let Some(moq) = q.min_order_qty {
        line.push_str(&format!(", MOQ {moq}"));
    }
    if let Some(route) = &q.route {
        line.push_str(&format!(", route {route}"));
    }
    if let Some(terms) = &q.terms {
        line.push_str(&format!(", {terms}"));
    }
    line.push_str(&format!(", valid until {}", q.valid_until.format("%Y-%m-%d")));
    line
}

fn knowledge_line(c: &KnowledgeChunk, snippet_chars: usize) -> String {
    let scope = match &c.country {
        Some(country) => format!("{}/{}", c.category, country),
        None => c.category.clone(),
    };
    format!(
        "- [{}] {} (v{}): {}",
        scope,
        c.title,
        c.version,
        snippet(&c.content, snippet_chars)
    )
}

fn relation_line(r: &EntityRelation) -> String {
    format!(
        "- {} ({}) {} {} ({}), confidence {:.2}",
        r.from_name, r.from_type, r.relation_type, r.to_name, r.to_type, r.confidence
    )
}

fn user_line(m: &ConversationMemory) -> String {
    format!("- [importance {}] {}", m.importance, m.summary)
}

/// First `max_chars` characters of `text` on one line, with `...` when cut.
fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
