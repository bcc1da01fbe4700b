use crate::config::Settings;
use crate::market::types::{Profile, Quote, SymbolMatch};
use crate::market::MarketDataClient;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

const DEFAULT_QUOTE_TTL_SECS: i64 = 300;
const DEFAULT_PROFILE_TTL_SECS: i64 = 1800;
const DEFAULT_SEARCH_TTL_SECS: i64 = 1800;

// Expired entries are swept on insert once the map grows past this.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Quote,
    Profile,
    Search,
}

/// Staleness tolerance per resource kind. Prices move fast; profiles barely change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub quote_ttl: Duration,
    pub profile_ttl: Duration,
    pub search_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::seconds(DEFAULT_QUOTE_TTL_SECS),
            profile_ttl: Duration::seconds(DEFAULT_PROFILE_TTL_SECS),
            search_ttl: Duration::seconds(DEFAULT_SEARCH_TTL_SECS),
        }
    }
}

impl CachePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        let d = Self::default();
        let secs = |v: Option<i64>, fallback: Duration| {
            v.filter(|s| *s >= 0).map(Duration::seconds).unwrap_or(fallback)
        };
        Self {
            quote_ttl: secs(settings.quote_cache_ttl_secs, d.quote_ttl),
            profile_ttl: secs(settings.profile_cache_ttl_secs, d.profile_ttl),
            search_ttl: secs(settings.search_cache_ttl_secs, d.search_ttl),
        }
    }

    pub fn ttl(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Quote => self.quote_ttl,
            ResourceKind::Profile => self.profile_ttl,
            ResourceKind::Search => self.search_ttl,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
}

/// Keyed cache whose entries expire `ttl` after they were fetched.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: tokio::sync::Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let guard = self.entries.lock().await;
        let entry = guard.get(key)?;
        if now - entry.fetched_at < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub async fn insert_at(&self, key: &str, value: V, now: DateTime<Utc>) {
        let mut guard = self.entries.lock().await;
        if guard.len() >= SWEEP_THRESHOLD {
            let ttl = self.ttl;
            guard.retain(|_, e| now - e.fetched_at < ttl);
        }
        guard.insert(
            key.to_string(),
            CacheEntry {
                value,
                fetched_at: now,
            },
        );
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Read-through cache in front of a market-data client. Failures are never cached.
pub struct CachedMarketData<C> {
    inner: C,
    quotes: TtlCache<Quote>,
    profiles: TtlCache<Profile>,
    searches: TtlCache<Vec<SymbolMatch>>,
}

impl<C: MarketDataClient> CachedMarketData<C> {
    pub fn new(inner: C, policy: CachePolicy) -> Self {
        Self {
            inner,
            quotes: TtlCache::new(policy.ttl(ResourceKind::Quote)),
            profiles: TtlCache::new(policy.ttl(ResourceKind::Profile)),
            searches: TtlCache::new(policy.ttl(ResourceKind::Search)),
        }
    }
}

#[async_trait::async_trait]
impl<C: MarketDataClient> MarketDataClient for CachedMarketData<C> {
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        if let Some(hit) = self.quotes.get_at(symbol, Utc::now()).await {
            tracing::trace!(%symbol, "quote cache hit");
            return Ok(hit);
        }
        let quote = self.inner.quote(symbol).await?;
        self.quotes.insert_at(symbol, quote.clone(), Utc::now()).await;
        Ok(quote)
    }

    async fn profile(&self, symbol: &str) -> Result<Profile> {
        if let Some(hit) = self.profiles.get_at(symbol, Utc::now()).await {
            tracing::trace!(%symbol, "profile cache hit");
            return Ok(hit);
        }
        let profile = self.inner.profile(symbol).await?;
        self.profiles
            .insert_at(symbol, profile.clone(), Utc::now())
            .await;
        Ok(profile)
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>> {
        let key = query.trim().to_lowercase();
        if let Some(hit) = self.searches.get_at(&key, Utc::now()).await {
            return Ok(hit);
        }
        let matches = self.inner.search(query).await?;
        self.searches.insert_at(&key, matches.clone(), Utc::now()).await;
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClient {
        quotes: AtomicUsize,
        profiles: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MarketDataClient for CountingClient {
        fn provider_name(&self) -> &'static str {
            "counting"
        }

        async fn quote(&self, _symbol: &str) -> Result<Quote> {
            self.quotes.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(!self.fail, "upstream down");
            Ok(Quote {
                current_price: Some(10.0),
                ..Default::default()
            })
        }

        async fn profile(&self, _symbol: &str) -> Result<Profile> {
            self.profiles.fetch_add(1, Ordering::SeqCst);
            Ok(Profile::default())
        }

        async fn search(&self, _query: &str) -> Result<Vec<SymbolMatch>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::seconds(300));
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap();
        cache.insert_at("AAPL", 1.0_f64, t0).await;

        assert_eq!(cache.get_at("AAPL", t0 + Duration::seconds(299)).await, Some(1.0));
        assert_eq!(cache.get_at("AAPL", t0 + Duration::seconds(300)).await, None);
        assert_eq!(cache.get_at("MSFT", t0).await, None);
    }

    #[test]
    fn default_policy_keeps_profiles_longer_than_quotes() {
        let p = CachePolicy::default();
        assert_eq!(p.ttl(ResourceKind::Quote), Duration::minutes(5));
        assert_eq!(p.ttl(ResourceKind::Profile), Duration::minutes(30));
    }

    #[tokio::test]
    async fn read_through_hits_upstream_once() {
        let cached = CachedMarketData::new(CountingClient::default(), CachePolicy::default());
        for _ in 0..3 {
            cached.quote("AAPL").await.unwrap();
            cached.profile("AAPL").await.unwrap();
        }
        assert_eq!(cached.inner.quotes.load(Ordering::SeqCst), 1);
        assert_eq!(cached.inner.profiles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let client = CountingClient {
            fail: true,
            ..Default::default()
        };
        let cached = CachedMarketData::new(client, CachePolicy::default());
        assert!(cached.quote("AAPL").await.is_err());
        assert!(cached.quote("AAPL").await.is_err());
        assert_eq!(cached.inner.quotes.load(Ordering::SeqCst), 2);
        assert_eq!(cached.quotes.len().await, 0);
    }
}
