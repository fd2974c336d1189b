use async_trait::async_trait;
use chrono::Utc;

use super::{MarketDataProvider, MarketListing, PriceSnapshot, ProviderError, SupplierOffer};

const CITIES: [&str; 5] = ["Shenzhen", "Yiwu", "Guangzhou", "Ningbo", "Dongguan"];

/// Deterministic stand-in data. The same input always yields the same output,
/// so dashboards and tests stay stable without network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedMarketData;

/// FNV-1a over the input; only used to spread mock values.
fn seed(input: &str) -> u64 {
    input.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[async_trait]
impl MarketDataProvider for SimulatedMarketData {
    async fn search_1688(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<SupplierOffer>, ProviderError> {
        let base = seed(keyword);
        let offers = (0..limit as u64)
            .map(|i| {
                let s = base.wrapping_add(i.wrapping_mul(7919));
                let city = CITIES[(s % CITIES.len() as u64) as usize];
                SupplierOffer {
                    offer_id: format!("sim-1688-{:08x}", s & 0xffff_ffff),
                    title: format!("{keyword} wholesale #{}", i + 1),
                    supplier_id: format!("sim-supplier-{}", s % 1000),
                    supplier_name: format!("{city} Trading Co. {}", s % 100),
                    price_cny: round2(5.0 + (s % 2000) as f64 / 10.0),
                    min_order_qty: 50 * (1 + (s % 20) as u32),
                    location: city.to_string(),
                    rating: round2(4.0 + (s % 10) as f64 / 10.0),
                    url: format!("https://detail.1688.com/offer/{}.html", s % 1_000_000_000),
                }
            })
            .collect();
        Ok(offers)
    }

    async fn scrape_amazon(
        &self,
        query: &str,
        country: &str,
        limit: usize,
    ) -> Result<Vec<MarketListing>, ProviderError> {
        let base = seed(query);
        let listings = (0..limit as u64)
            .map(|i| {
                let s = base.wrapping_add(i.wrapping_mul(104_729));
                let asin = format!("B0SIM{:05}", s % 100_000);
                MarketListing {
                    url: Some(format!("https://www.amazon.com/dp/{asin}")),
                    asin,
                    title: format!("{query} ({country}) listing #{}", i + 1),
                    price: Some(round2(9.99 + (s % 4000) as f64 / 100.0)),
                    currency: currency_for(country).to_string(),
                    rating: Some(round2(3.5 + (s % 15) as f64 / 10.0)),
                    reviews: Some((s % 5000) as u32),
                    source: "simulated".to_string(),
                }
            })
            .collect();
        Ok(listings)
    }

    async fn monitor_price(
        &self,
        asin: &str,
        country: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        let s = seed(asin);
        Ok(PriceSnapshot {
            asin: asin.to_string(),
            title: Some(format!("Simulated product {asin}")),
            price: Some(round2(9.99 + (s % 4000) as f64 / 100.0)),
            currency: currency_for(country).to_string(),
            in_stock: s % 7 != 0,
            checked_at: Utc::now(),
            source: "simulated".to_string(),
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

pub(crate) fn currency_for(country: &str) -> &'static str {
    match country.to_ascii_uppercase().as_str() {
        "DE" | "FR" | "IT" | "ES" | "NL" => "EUR",
        "GB" | "UK" => "GBP",
        "JP" => "JPY",
        "CA" => "CAD",
        _ => "USD",
    }
}
