//! Joins stored watchlist entries with live market data.
//!
//! Every entry triggers a quote and a profile fetch; all fetches for all entries run
//! concurrently and the batch waits for every one of them to settle. A failure for one symbol
//! degrades only that symbol's row, and rows come back in the order the entries were given.

use crate::domain::enriched::EnrichedStock;
use crate::domain::entry::WatchlistEntry;
use crate::error::WatchlistError;
use crate::market::types::{Profile, Quote};
use crate::market::MarketDataClient;

pub async fn enrich_entries(
    market: &dyn MarketDataClient,
    entries: &[WatchlistEntry],
) -> Vec<EnrichedStock> {
    let t0 = std::time::Instant::now();
    let rows = futures::future::join_all(entries.iter().map(|entry| enrich_one(market, entry))).await;

    let degraded = rows.iter().filter(|r| r.is_unavailable()).count();
    tracing::debug!(
        provider = market.provider_name(),
        entries = entries.len(),
        degraded,
        elapsed_ms = t0.elapsed().as_millis(),
        "watchlist enrichment finished"
    );
    rows
}

async fn enrich_one(market: &dyn MarketDataClient, entry: &WatchlistEntry) -> EnrichedStock {
    match fetch_market_data(market, &entry.symbol).await {
        Ok((quote, profile)) => EnrichedStock::from_market(
            entry,
            quote.current_price,
            quote.percent_change,
            profile.market_capitalization,
        ),
        Err(err) => {
            tracing::warn!(symbol = %entry.symbol, error = %err, "showing watchlist entry without market data");
            EnrichedStock::unavailable(entry)
        }
    }
}

async fn fetch_market_data(
    market: &dyn MarketDataClient,
    symbol: &str,
) -> Result<(Quote, Profile), WatchlistError> {
    tokio::try_join!(market.quote(symbol), market.profile(symbol)).map_err(|e| {
        WatchlistError::UpstreamUnavailable {
            symbol: symbol.to_string(),
            detail: format!("{e:#}"),
        }
    })
}
