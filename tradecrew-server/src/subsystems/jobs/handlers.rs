//! Job handlers: one per `JobKind`, each a single call into the market-data provider.

use serde::Deserialize;
use thiserror::Error;
use tradecrew_core::models::JobKind;
use tradecrew_core::{MarketDataProvider, ProviderError};

const DEFAULT_RESULT_LIMIT: usize = 20;
const MAX_RESULT_LIMIT: usize = 100;
const DEFAULT_MARKETPLACE: &str = "US";

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Deserialize)]
pub struct Search1688Payload {
    pub keyword: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AmazonScrapePayload {
    pub query: String,
    pub country: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PriceMonitorPayload {
    pub asin: String,
    pub country: Option<String>,
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &serde_json::Value) -> Result<T, JobError> {
    serde_json::from_value(payload.clone()).map_err(|e| JobError::InvalidPayload(e.to_string()))
}

fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, JobError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(JobError::InvalidPayload(format!("{field} must not be empty")));
    }
    Ok(value)
}

fn result_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_RESULT_LIMIT).clamp(1, MAX_RESULT_LIMIT)
}

fn marketplace(country: &Option<String>) -> String {
    country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_MARKETPLACE)
        .to_ascii_uppercase()
}

/// Check a payload before a job record is created for it.
pub fn validate_payload(kind: JobKind, payload: &serde_json::Value) -> Result<(), JobError> {
    match kind {
        JobKind::Search1688 => {
            let p: Search1688Payload = parse(payload)?;
            non_empty("keyword", &p.keyword)?;
        }
        JobKind::AmazonScrape => {
            let p: AmazonScrapePayload = parse(payload)?;
            non_empty("query", &p.query)?;
        }
        JobKind::PriceMonitor => {
            let p: PriceMonitorPayload = parse(payload)?;
            non_empty("asin", &p.asin)?;
        }
    }
    Ok(())
}

/// Run the handler for `kind` and return the job result document.
pub async fn run_handler(
    provider: &dyn MarketDataProvider,
    kind: JobKind,
    payload: &serde_json::Value,
) -> Result<serde_json::Value, JobError> {
    match kind {
        JobKind::Search1688 => {
            let p: Search1688Payload = parse(payload)?;
            let keyword = non_empty("keyword", &p.keyword)?;
            let offers = provider.search_1688(keyword, result_limit(p.limit)).await?;
            Ok(serde_json::json!({
                "provider": provider.name(),
                "keyword": keyword,
                "count": offers.len(),
                "offers": offers,
            }))
        }
        JobKind::AmazonScrape => {
            let p: AmazonScrapePayload = parse(payload)?;
            let query = non_empty("query", &p.query)?;
            let country = marketplace(&p.country);
            let listings = provider
                .scrape_amazon(query, &country, result_limit(p.limit))
                .await?;
            Ok(serde_json::json!({
                "provider": provider.name(),
                "query": query,
                "country": country,
                "count": listings.len(),
                "listings": listings,
            }))
        }
        JobKind::PriceMonitor => {
            let p: PriceMonitorPayload = parse(payload)?;
            let asin = non_empty("asin", &p.asin)?;
            let snapshot = provider.monitor_price(asin, &marketplace(&p.country)).await?;
            Ok(serde_json::json!({
                "provider": provider.name(),
                "snapshot": snapshot,
            }))
        }
    }
}
