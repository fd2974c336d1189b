pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;

pub use config::TradecrewConfig;
pub use error::{Result, TradecrewError};
pub use providers::{
    create_provider, ApifyMarketData, FallbackMarketData, MarketDataProvider, ProviderError,
    RapidApiMarketData, SimulatedMarketData,
};
