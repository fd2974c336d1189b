use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::rapidapi::RapidApiMarketData;
use super::simulated::{currency_for, SimulatedMarketData};
use super::{parse_price, MarketDataProvider, MarketListing, PriceSnapshot, ProviderError, SupplierOffer};
use crate::config::ProvidersConfig;

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: ActorRun,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorRun {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

/// One dataset item from the Amazon crawler actor. Prices arrive either as a
/// number, a display string, or an object with `value`/`currency`.
#[derive(Debug, Deserialize)]
struct CrawlerItem {
    asin: Option<String>,
    title: Option<String>,
    price: Option<serde_json::Value>,
    stars: Option<f64>,
    #[serde(rename = "reviewsCount")]
    reviews_count: Option<u32>,
    url: Option<String>,
}

impl CrawlerItem {
    fn into_listing(self, country: &str) -> Option<MarketListing> {
        let asin = self.asin?;
        let (price, currency) = match self.price {
            Some(serde_json::Value::Number(n)) => (n.as_f64(), None),
            Some(serde_json::Value::String(s)) => (parse_price(&s), None),
            Some(serde_json::Value::Object(o)) => (
                o.get("value").and_then(|v| v.as_f64()),
                o.get("currency").and_then(|c| c.as_str()).map(str::to_string),
            ),
            _ => (None, None),
        };

        Some(MarketListing {
            asin,
            title: self.title.unwrap_or_default(),
            price,
            currency: currency.unwrap_or_else(|| currency_for(country).to_string()),
            rating: self.stars,
            reviews: self.reviews_count,
            url: self.url,
            source: "apify".to_string(),
        })
    }
}

fn is_failed_status(status: &str) -> bool {
    matches!(status, "FAILED" | "ABORTED" | "TIMED-OUT")
}

fn amazon_domain(country: &str) -> &'static str {
    match country {
        "DE" => "amazon.de",
        "GB" | "UK" => "amazon.co.uk",
        "FR" => "amazon.fr",
        "IT" => "amazon.it",
        "ES" => "amazon.es",
        "JP" => "amazon.co.jp",
        "CA" => "amazon.ca",
        _ => "amazon.com",
    }
}

/// Amazon scraping through an Apify actor run: start the run, poll until it
/// finishes, then read its default dataset.
pub struct ApifyMarketData {
    client: Client,
    token: String,
    base_url: String,
    actor: String,
    poll_interval: Duration,
    timeout: Duration,
    rapidapi: Option<RapidApiMarketData>,
}

impl ApifyMarketData {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(config, config.apify_base_url.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &ProvidersConfig, base_url: String) -> Result<Self, ProviderError> {
        let token = config
            .apify_token()
            .ok_or(ProviderError::MissingApiKey)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let rapidapi = match config.rapidapi_key() {
            Some(_) => Some(RapidApiMarketData::new(config)?),
            None => None,
        };

        Ok(Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            actor: config.apify_actor.clone(),
            poll_interval: Duration::from_secs(config.apify_poll_interval_seconds),
            timeout: Duration::from_secs(config.apify_timeout_seconds),
            rapidapi,
        })
    }

    /// Override the run polling cadence and the overall wait budget.
    pub fn with_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(code = status.as_u16(), "Apify API error");
        Err(ProviderError::Api {
            code: status.as_u16(),
            message: body,
        })
    }

    async fn start_run(&self, input: &serde_json::Value) -> Result<ActorRun, ProviderError> {
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor);
        let response = self
            .client
            .post(&url)
            .query(&[("token", self.token.as_str())])
            .json(input)
            .send()
            .await?;
        let envelope: RunEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.data)
    }

    async fn get_run(&self, run_id: &str) -> Result<ActorRun, ProviderError> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;
        let envelope: RunEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.data)
    }

    /// Poll until the run succeeds. Abandoning the wait leaves the remote run going.
    async fn wait_for_run(&self, mut run: ActorRun) -> Result<ActorRun, ProviderError> {
        let started = Instant::now();
        loop {
            if run.status == "SUCCEEDED" {
                return Ok(run);
            }
            if is_failed_status(&run.status) {
                return Err(ProviderError::ActorFailed { status: run.status });
            }
            if started.elapsed() >= self.timeout {
                tracing::warn!(run_id = %run.id, status = %run.status, "Apify run did not finish in time");
                return Err(ProviderError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self.get_run(&run.id).await?;
        }
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<CrawlerItem>, ProviderError> {
        let url = format!("{}/datasets/{}/items", self.base_url, dataset_id);
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str()), ("format", "json")])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl MarketDataProvider for ApifyMarketData {
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
        let search_url = reqwest::Url::parse_with_params(
            &format!("https://www.{}/s", amazon_domain(&country)),
            &[("k", query)],
        )
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let input = serde_json::json!({
            "categoryOrProductUrls": [{ "url": search_url.as_str() }],
            "maxItemsPerStartUrl": limit,
        });

        let run = self.start_run(&input).await?;
        tracing::debug!(run_id = %run.id, query, "Apify run started");

        let run = self.wait_for_run(run).await?;
        let dataset_id = run
            .default_dataset_id
            .ok_or_else(|| ProviderError::InvalidResponse("run has no dataset".to_string()))?;

        let listings = self
            .dataset_items(&dataset_id)
            .await?
            .into_iter()
            .filter_map(|item| item.into_listing(&country))
            .take(limit)
            .collect();
        Ok(listings)
    }

    async fn monitor_price(
        &self,
        asin: &str,
        country: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        match &self.rapidapi {
            Some(rapidapi) => rapidapi.monitor_price(asin, country).await,
            None => SimulatedMarketData.monitor_price(asin, country).await,
        }
    }

    fn name(&self) -> &str {
        "apify"
    }
}
