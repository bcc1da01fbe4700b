pub mod domain;
pub mod enrich;
pub mod error;
pub mod invalidate;
pub mod market;
pub mod service;
pub mod session;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub finnhub_base_url: Option<String>,
        pub finnhub_api_key: Option<String>,
        pub finnhub_timeout_secs: Option<u64>,
        pub finnhub_retries: Option<u32>,
        pub quote_cache_ttl_secs: Option<i64>,
        pub profile_cache_ttl_secs: Option<i64>,
        pub search_cache_ttl_secs: Option<i64>,
        pub internal_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                finnhub_base_url: non_empty_var("FINNHUB_BASE_URL"),
                finnhub_api_key: non_empty_var("FINNHUB_API_KEY"),
                finnhub_timeout_secs: parsed_var("FINNHUB_TIMEOUT_SECS")?,
                finnhub_retries: parsed_var("FINNHUB_RETRIES")?,
                quote_cache_ttl_secs: parsed_var("QUOTE_CACHE_TTL_SECS")?,
                profile_cache_ttl_secs: parsed_var("PROFILE_CACHE_TTL_SECS")?,
                search_cache_ttl_secs: parsed_var("SEARCH_CACHE_TTL_SECS")?,
                internal_api_key: non_empty_var("INTERNAL_API_KEY"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn finnhub_base_url(&self) -> String {
            self.finnhub_base_url
                .clone()
                .unwrap_or_else(|| crate::market::finnhub::DEFAULT_BASE_URL.to_string())
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parsed_var<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match non_empty_var(key) {
            Some(v) => v
                .trim()
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("{key} must be a number (got {v:?})")),
            None => Ok(None),
        }
    }
}
