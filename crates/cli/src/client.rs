use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use watchlist_core::domain::table::WatchlistPage;
use watchlist_core::error::MutationOutcome;
use watchlist_core::service::StockSearchResult;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the watchlist API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    is_in_watchlist: bool,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build api http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let res = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("GET {path} HTTP {status}: {text}");
        }
        res.json::<T>()
            .await
            .with_context(|| format!("failed to parse GET {path} response"))
    }

    pub async fn list(&self, search: Option<&str>, page: usize) -> Result<WatchlistPage> {
        let mut query = vec![("page", page.to_string())];
        if let Some(q) = search {
            query.push(("q", q.to_string()));
        }
        self.get_json("/watchlist", &query).await
    }

    pub async fn is_in_watchlist(&self, symbol: &str) -> Result<bool> {
        let res: StatusResponse = self.get_json(&format!("/watchlist/{symbol}"), &[]).await?;
        Ok(res.is_in_watchlist)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>> {
        self.get_json("/search", &[("q", query.to_string())]).await
    }

    /// Mutation failures come back as an outcome; only transport errors are `Err`.
    pub async fn add(&self, symbol: &str, company: &str) -> Result<MutationOutcome> {
        let res = self
            .http
            .post(format!("{}/watchlist", self.base_url))
            .headers(self.headers()?)
            .json(&AddBody { symbol, company })
            .send()
            .await
            .context("POST /watchlist failed")?;
        read_outcome(res).await
    }

    pub async fn remove(&self, symbol: &str) -> Result<MutationOutcome> {
        let res = self
            .http
            .delete(format!("{}/watchlist/{symbol}", self.base_url))
            .headers(self.headers()?)
            .send()
            .await
            .context("DELETE /watchlist failed")?;
        read_outcome(res).await
    }
}

#[derive(Serialize)]
struct AddBody<'a> {
    symbol: &'a str,
    company: &'a str,
}

async fn read_outcome(res: reqwest::Response) -> Result<MutationOutcome> {
    let status = res.status();
    res.json::<MutationOutcome>()
        .await
        .with_context(|| format!("unexpected mutation response (HTTP {status})"))
}
