pub mod cache;
pub mod finnhub;
pub mod types;

use anyhow::Result;
use types::{Profile, Quote, SymbolMatch};

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn quote(&self, symbol: &str) -> Result<Quote>;

    async fn profile(&self, symbol: &str) -> Result<Profile>;

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>>;
}
