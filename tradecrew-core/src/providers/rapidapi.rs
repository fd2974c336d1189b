use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use super::simulated::{currency_for, SimulatedMarketData};
use super::{parse_price, MarketDataProvider, MarketListing, PriceSnapshot, ProviderError, SupplierOffer};
use crate::config::ProvidersConfig;

// ============================================================================
// RapidAPI response structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: Option<String>,
    data: Option<T>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    products: Vec<ApiProduct>,
}

#[derive(Debug, Deserialize)]
struct ApiProduct {
    asin: String,
    product_title: Option<String>,
    product_price: Option<String>,
    product_star_rating: Option<String>,
    product_num_ratings: Option<u32>,
    product_url: Option<String>,
    currency: Option<String>,
    product_availability: Option<String>,
}

// ============================================================================
// RapidApiMarketData
// ============================================================================

/// Amazon data through the RapidAPI "real-time Amazon data" gateway.
/// 1688 has no public API here; those searches come from the simulation.
#[derive(Debug, Clone)]
pub struct RapidApiMarketData {
    client: Client,
    api_key: String,
    host: String,
    base_url: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl RapidApiMarketData {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(config, config.rapidapi_base_url.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &ProvidersConfig, base_url: String) -> Result<Self, ProviderError> {
        let api_key = config
            .rapidapi_key()
            .ok_or(ProviderError::MissingApiKey)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            host: config.rapidapi_host.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    async fn get_with_retry<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries);

        let result = Retry::spawn(retry_strategy, || self.get_once(endpoint, query)).await;

        result.map_err(|e| {
            tracing::error!(
                attempts = self.max_retries,
                endpoint,
                error = %e,
                "All RapidAPI retry attempts failed"
            );
            ProviderError::RetryExhausted {
                attempts: self.max_retries,
            }
        })
    }

    async fn get_once<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(code = status.as_u16(), endpoint, "RapidAPI error");
            return Err(ProviderError::Api {
                code: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        if envelope.status.as_deref().is_some_and(|s| s != "OK") {
            let message = envelope
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "status not OK".to_string());
            return Err(ProviderError::InvalidResponse(message));
        }

        envelope
            .data
            .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))
    }

    fn to_listing(product: ApiProduct, country: &str) -> MarketListing {
        MarketListing {
            title: product.product_title.unwrap_or_default(),
            price: product.product_price.as_deref().and_then(parse_price),
            currency: product
                .currency
                .unwrap_or_else(|| currency_for(country).to_string()),
            rating: product
                .product_star_rating
                .as_deref()
                .and_then(|r| r.parse().ok()),
            reviews: product.product_num_ratings,
            url: product.product_url,
            asin: product.asin,
            source: "rapidapi".to_string(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for RapidApiMarketData {
    async fn search_1688(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<SupplierOffer>, ProviderError> {
        SimulatedMarketData.search_1688(keyword, limit).await
    }

    async fn scrape_amazon(
        &self,
        query: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<MarketListing>, ProviderError> {
        let country = country.to_ascii_uppercase();
        let data: SearchData = self
            .get_with_retry("search", &[("query", query), ("country", &country), ("page", "1")])
            .await?;

        Ok(data
            .products
            .into_iter()
            .take(limit)
            .map(|p| Self::to_listing(p, &country))
            .collect())
    }

    async fn monitor_price(
        &self,
        asin: &str,
        country: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        let country = country.to_ascii_uppercase();
        let product: ApiProduct = self
            .get_with_retry("product-details", &[("asin", asin), ("country", &country)])
            .await?;

        let in_stock = product
            .product_availability
            .as_deref()
            .map(|a| !a.to_ascii_lowercase().contains("unavailable"))
            .unwrap_or(true);

        Ok(PriceSnapshot {
            asin: product.asin,
            title: product.product_title,
            price: product.product_price.as_deref().and_then(parse_price),
            currency: product
                .currency
                .unwrap_or_else(|| currency_for(&country).to_string()),
            in_stock,
            checked_at: Utc::now(),
            source: "rapidapi".to_string(),
        })
    }

    fn name(&self) -> &str {
        "rapidapi"
    }
}
