//! Function-calling tools over the memory subsystem.
//!
//! Agents discover the tools through [`tool_definitions`] (name, description and a
//! JSON Schema of the arguments) and invoke them through [`execute_tool`].

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tradecrew_core::models::NewQuote;
use tradecrew_core::{Result, TradecrewError};

use super::{CapabilityQuery, HybridQuery, KnowledgeQuery, MemoryService, QuoteQuery};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryQuotesParams {
    #[schemars(description = "Filter by item type: 'product', 'freight' or 'service'")]
    pub item_type: Option<String>,
    #[schemars(description = "Substring of the item name, case-insensitive")]
    pub item_name: Option<String>,
    #[schemars(description = "Substring of the route, e.g. 'CN-DE'")]
    pub route: Option<String>,
    pub supplier_id: Option<String>,
    #[schemars(description = "Maximum number of quotes (1-100). Defaults to 20.")]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveQuoteParams {
    #[schemars(description = "'product', 'freight' or 'service'")]
    pub item_type: String,
    pub item_name: String,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub price: f64,
    #[schemars(description = "3-letter currency code. Defaults to USD.")]
    pub currency: Option<String>,
    pub unit: Option<String>,
    pub min_order_qty: Option<i32>,
    pub route: Option<String>,
    #[schemars(description = "Incoterms or payment terms")]
    pub terms: Option<String>,
    pub source: Option<String>,
    #[schemars(description = "Days the quote stays valid. Defaults to 30.")]
    pub validity_days: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchKnowledgeParams {
    #[schemars(description = "Text matched against title and content")]
    pub query: Option<String>,
    #[schemars(description = "regulation, contract, spec, logistics or other")]
    pub category: Option<String>,
    #[schemars(description = "ISO country code, e.g. 'DE'")]
    pub country: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindSuppliersParams {
    #[schemars(description = "Product name the supplier produces or supplies")]
    pub product: String,
    #[schemars(description = "Minimum relation confidence (0.0-1.0)")]
    pub min_confidence: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecallUserMemoryParams {
    pub user_id: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HybridSearchParams {
    pub query: String,
    pub country: Option<String>,
    pub route: Option<String>,
    #[schemars(description = "Product type for the relationship lookup; defaults to the query")]
    pub product_type: Option<String>,
    #[schemars(description = "Include this user's conversation history")]
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

fn parameters_of<T: JsonSchema>() -> serde_json::Value {
    let mut schema = schema_for!(T).to_value();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
    }
    schema
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "query_quotes",
            description: "Look up current supplier, freight or service quotes, cheapest first.",
            parameters: parameters_of::<QueryQuotesParams>(),
        },
        ToolDefinition {
            name: "save_quote",
            description: "Record a new quote. Replaces the live quote for the same supplier and item.",
            parameters: parameters_of::<SaveQuoteParams>(),
        },
        ToolDefinition {
            name: "search_knowledge",
            description: "Search regulations, contracts, logistics notes and product specs.",
            parameters: parameters_of::<SearchKnowledgeParams>(),
        },
        ToolDefinition {
            name: "find_suppliers",
            description: "Find suppliers known to produce or supply a product.",
            parameters: parameters_of::<FindSuppliersParams>(),
        },
        ToolDefinition {
            name: "recall_user_memory",
            description: "Recall what is known about a user from earlier conversations.",
            parameters: parameters_of::<RecallUserMemoryParams>(),
        },
        ToolDefinition {
            name: "hybrid_search",
            description: "Search quotes, knowledge, relationships and user history at once and return a ready-to-use context.",
            parameters: parameters_of::<HybridSearchParams>(),
        },
    ]
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: serde_json::Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| TradecrewError::validation(format!("invalid arguments for {tool}: {e}")))
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| TradecrewError::Other(e.to_string()))
}

/// Run one tool by name. Unknown names are `NotFound`; bad arguments are `Validation`.
pub async fn execute_tool(
    memory: &MemoryService,
    name: &str,
    args: serde_json::Value,
) -> Result<serde_json::Value> {
    tracing::debug!(tool = name, "Executing memory tool");

    match name {
        "query_quotes" => {
            let p: QueryQuotesParams = parse_args(name, args)?;
            let quotes = memory
                .get_quotes(&QuoteQuery {
                    item_type: p.item_type,
                    item_name: p.item_name,
                    route: p.route,
                    supplier_id: p.supplier_id,
                    include_expired: false,
                    limit: p.limit,
                })
                .await?;
            to_json(serde_json::json!({ "count": quotes.len(), "quotes": quotes }))
        }
        "save_quote" => {
            let p: SaveQuoteParams = parse_args(name, args)?;
            let saved = memory
                .save_quote(NewQuote {
                    item_type: p.item_type,
                    item_name: p.item_name,
                    supplier_id: p.supplier_id,
                    supplier_name: p.supplier_name,
                    price: p.price,
                    currency: p.currency,
                    unit: p.unit,
                    min_order_qty: p.min_order_qty,
                    route: p.route,
                    terms: p.terms,
                    source: p.source.or_else(|| Some("agent".to_string())),
                    validity_days: p.validity_days,
                })
                .await?;
            to_json(saved)
        }
        "search_knowledge" => {
            let p: SearchKnowledgeParams = parse_args(name, args)?;
            let chunks = memory
                .search_knowledge(&KnowledgeQuery {
                    query: p.query,
                    category: p.category,
                    country: p.country,
                    limit: p.limit,
                })
                .await?;
            to_json(serde_json::json!({ "count": chunks.len(), "chunks": chunks }))
        }
        "find_suppliers" => {
            let p: FindSuppliersParams = parse_args(name, args)?;
            let suppliers = memory
                .find_suppliers_by_capability(&CapabilityQuery {
                    product: p.product,
                    min_confidence: p.min_confidence,
                    limit: p.limit,
                })
                .await?;
            to_json(serde_json::json!({ "count": suppliers.len(), "suppliers": suppliers }))
        }
        "recall_user_memory" => {
            let p: RecallUserMemoryParams = parse_args(name, args)?;
            let memories = memory.get_user_memory(&p.user_id, p.limit).await?;
            to_json(serde_json::json!({ "count": memories.len(), "memories": memories }))
        }
        "hybrid_search" => {
            let p: HybridSearchParams = parse_args(name, args)?;
            let result = memory
                .hybrid_search(&HybridQuery {
                    query: p.query,
                    country: p.country,
                    route: p.route,
                    product_type: p.product_type,
                    user_id: p.user_id,
                    limit: p.limit,
                })
                .await?;
            to_json(result)
        }
        other => Err(TradecrewError::NotFound(format!("unknown tool '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_unique_and_complete() {
        let defs = tool_definitions();
        let mut names: Vec<&str> = defs.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(
            names,
            vec![
                "find_suppliers",
                "hybrid_search",
                "query_quotes",
                "recall_user_memory",
                "save_quote",
                "search_knowledge"
            ]
        );
    }

    #[test]
    fn test_schemas_use_wire_field_names() {
        let defs = tool_definitions();
        let save = defs.iter().find(|d| d.name == "save_quote").unwrap();
        let props = save.parameters["properties"].as_object().unwrap();
        assert!(props.contains_key("itemType"));
        assert!(props.contains_key("validityDays"));

        let required = save.parameters["required"].as_array().unwrap();
        assert!(required.contains(&serde_json::json!("itemName")));
        assert!(required.contains(&serde_json::json!("price")));
        assert!(!required.contains(&serde_json::json!("currency")));
        assert!(save.parameters.get("$schema").is_none());
    }

    #[test]
    fn test_parse_args_rejects_missing_required_field() {
        let err = parse_args::<FindSuppliersParams>("find_suppliers", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, TradecrewError::Validation(_)));
    }
}
