//! Market-data providers for the sourcing jobs.
//!
//! One `MarketDataProvider` is selected at startup by [`create_provider`]:
//! - **Apify**: Amazon scraping through an Apify actor run (start, poll, read dataset)
//! - **RapidAPI**: Amazon search and product details over the RapidAPI gateway
//! - **Simulated**: deterministic mock data, used when no keys are configured
//!
//! Real providers are wrapped in [`FallbackMarketData`], which answers from the
//! simulation whenever the upstream call fails.

mod apify;
mod rapidapi;
mod simulated;

pub use apify::ApifyMarketData;
pub use rapidapi::RapidApiMarketData;
pub use simulated::SimulatedMarketData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProvidersConfig;

// ============================================================================
// MarketDataProvider trait
// ============================================================================

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Search 1688.com wholesale offers for a keyword.
    async fn search_1688(&self, keyword: &str, limit: usize)
        -> Result<Vec<SupplierOffer>, ProviderError>;

    /// Search Amazon listings for a query in a marketplace country (e.g. `US`).
    async fn scrape_amazon(
        &self,
        query: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<MarketListing>, ProviderError>;

    /// Current price of one Amazon product.
    async fn monitor_price(&self, asin: &str, country: &str)
        -> Result<PriceSnapshot, ProviderError>;

    /// Provider name for logging and job results.
    fn name(&self) -> &str;
}

// ============================================================================
// Data types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupplierOffer {
    pub offer_id: String,
    pub title: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub price_cny: f64,
    pub min_order_qty: u32,
    pub location: String,
    pub rating: f64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketListing {
    pub asin: String,
    pub title: String,
    pub price: Option<f64>,
    pub currency: String,
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
    pub url: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub asin: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub in_stock: bool,
    pub checked_at: DateTime<Utc>,
    pub source: String,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Actor run ended with status {status}")]
    ActorFailed { status: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Factory
// ============================================================================

/// Pick the provider once, from configuration.
pub fn create_provider(config: &ProvidersConfig) -> Box<dyn MarketDataProvider> {
    if config.apify_token().is_some() {
        match ApifyMarketData::new(config) {
            Ok(p) => {
                tracing::info!("Market data provider: apify (simulation fallback)");
                return Box::new(FallbackMarketData::new(Box::new(p)));
            }
            Err(e) => tracing::warn!(error = %e, "Apify provider unavailable"),
        }
    }

    if config.rapidapi_key().is_some() {
        match RapidApiMarketData::new(config) {
            Ok(p) => {
                tracing::info!("Market data provider: rapidapi (simulation fallback)");
                return Box::new(FallbackMarketData::new(Box::new(p)));
            }
            Err(e) => tracing::warn!(error = %e, "RapidAPI provider unavailable"),
        }
    }

    tracing::info!("Market data provider: simulated (no API keys configured)");
    Box::new(SimulatedMarketData)
}

/// Parse a display price such as `"$1,299.99"` or `"12,5 €"` into a number.
pub(crate) fn parse_price(raw: &str) -> Option<f64> {
    let mut digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    // A lone comma followed by two digits is a decimal separator.
    if !digits.contains('.') && digits.rfind(',').is_some_and(|i| digits.len() - i == 3) {
        digits = digits.replacen(',', ".", 1);
    }
    digits.retain(|c| c != ',');
    digits.parse().ok()
}

// ============================================================================
// FallbackMarketData
// ============================================================================

/// Wraps a real provider. On any error, logs a warning and answers from the
/// simulation so a job never fails because an upstream is down.
pub struct FallbackMarketData {
    inner: Box<dyn MarketDataProvider>,
    simulated: SimulatedMarketData,
}

impl FallbackMarketData {
    pub fn new(inner: Box<dyn MarketDataProvider>) -> Self {
        Self {
            inner,
            simulated: SimulatedMarketData,
        }
    }
}

#[async_trait]
impl MarketDataProvider for FallbackMarketData {
    async fn search_1688(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<SupplierOffer>, ProviderError> {
        match self.inner.search_1688(keyword, limit).await {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(provider = self.inner.name(), error = %e, "1688 search failed, using simulated offers");
                self.simulated.search_1688(keyword, limit).await
            }
        }
    }

    async fn scrape_amazon(
        &self,
        query: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<MarketListing>, ProviderError> {
        match self.inner.scrape_amazon(query, country, limit).await {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(provider = self.inner.name(), error = %e, "Amazon scrape failed, using simulated listings");
                self.simulated.scrape_amazon(query, country, limit).await
            }
        }
    }

    async fn monitor_price(
        &self,
        asin: &str,
        country: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        match self.inner.monitor_price(asin, country).await {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(provider = self.inner.name(), error = %e, "Price check failed, using simulated price");
                self.simulated.monitor_price(asin, country).await
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
