use crate::config::Settings;
use crate::market::types::{Profile, Quote, SearchResponse, SymbolMatch};
use crate::market::MarketDataClient;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const SEARCH_RESULT_LIMIT: usize = 10;
// Backoff stops doubling after this many retries.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Finnhub answered 429. Not retried: retrying only burns more of the quota.
#[derive(Debug)]
struct RateLimited {
    path: String,
}

impl std::fmt::Display for RateLimited {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "finnhub {} rate limited (HTTP 429)", self.path)
    }
}

impl std::error::Error for RateLimited {}

#[derive(Debug, Clone)]
pub struct FinnhubClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
    backoff: Duration,
}

impl FinnhubClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs = settings.finnhub_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retries = settings.finnhub_retries.unwrap_or(DEFAULT_RETRIES);

        if settings.finnhub_api_key.is_none() {
            tracing::warn!("FINNHUB_API_KEY is not set; market data requests will be rejected");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build finnhub http client")?;

        Ok(Self {
            http,
            base_url: settings.finnhub_base_url(),
            api_key: settings.finnhub_api_key.clone(),
            retries,
            backoff: Duration::from_secs(1),
        })
    }

    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build finnhub http client")?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key,
            retries: DEFAULT_RETRIES,
            backoff: Duration::from_secs(1),
        })
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries.max(1);
        self.backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-finnhub-token", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("finnhub request {path} failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read finnhub response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("finnhub {path} response is not valid JSON: {text}"))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RateLimited {
                path: path.to_string(),
            })
            .with_context(|| format!("finnhub {path}: {raw_json}"));
        }
        if !status.is_success() {
            anyhow::bail!("finnhub {path} HTTP {status}: {raw_json}");
        }
        if let Some(err) = raw_json.get("error").and_then(Value::as_str) {
            anyhow::bail!("finnhub {path} error: {err}");
        }
        Ok(raw_json)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut attempt: u32 = 0;
        let raw = loop {
            attempt += 1;
            match self.fetch_once(path, query).await {
                Ok(raw) => break raw,
                Err(err) => {
                    if attempt >= self.retries || err.downcast_ref::<RateLimited>().is_some() {
                        return Err(err);
                    }
                    let backoff = backoff_for(self.backoff, attempt);
                    tracing::warn!(attempt, path, ?backoff, error = %err, "finnhub fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        serde_json::from_value::<T>(raw)
            .with_context(|| format!("failed to parse finnhub {path} response"))
    }
}

#[async_trait::async_trait]
impl MarketDataClient for FinnhubClient {
    fn provider_name(&self) -> &'static str {
        "finnhub"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let quote: Quote = self.get_json("/quote", &[("symbol", symbol)]).await?;
        validate_quote(symbol, &quote)?;
        Ok(quote)
    }

    async fn profile(&self, symbol: &str) -> Result<Profile> {
        self.get_json("/stock/profile2", &[("symbol", symbol)]).await
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let res: SearchResponse = self.get_json("/search", &[("q", query)]).await?;
        Ok(res
            .result
            .into_iter()
            .filter(|m| !m.symbol.trim().is_empty())
            .take(SEARCH_RESULT_LIMIT)
            .collect())
    }
}

fn backoff_for(base: Duration, attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
    base.saturating_mul(1 << doublings)
}

fn validate_quote(symbol: &str, quote: &Quote) -> Result<()> {
    anyhow::ensure!(
        quote.current_price.is_some(),
        "quote for {symbol} is missing the current price"
    );
    Ok(())
}
