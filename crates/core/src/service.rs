use crate::domain::enriched::EnrichedStock;
use crate::domain::entry::{normalize_symbol, WatchlistEntry};
use crate::enrich::enrich_entries;
use crate::error::WatchlistError;
use crate::invalidate::{ViewInvalidator, STOCK_DETAIL_VIEW, WATCHLIST_VIEW};
use crate::market::MarketDataClient;
use crate::session::{Identity, SessionProvider};
use crate::storage::{InsertOutcome, WatchlistStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSearchResult {
    pub symbol: String,
    pub name: String,
    pub display_symbol: String,
    pub kind: String,
    pub is_in_watchlist: bool,
}

#[derive(Clone)]
pub struct WatchlistService {
    store: Arc<dyn WatchlistStore>,
    market: Arc<dyn MarketDataClient>,
    views: Arc<dyn ViewInvalidator>,
}

impl WatchlistService {
    pub fn new(
        store: Arc<dyn WatchlistStore>,
        market: Arc<dyn MarketDataClient>,
        views: Arc<dyn ViewInvalidator>,
    ) -> Self {
        Self {
            store,
            market,
            views,
        }
    }

    /// The caller's watchlist with live market data, most recently added first.
    ///
    /// Never fails: anonymous callers and storage failures both get an empty list.
    pub async fn watchlist_with_data(&self, session: &dyn SessionProvider) -> Vec<EnrichedStock> {
        let identity = match session.current_session().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed; returning empty watchlist");
                return Vec::new();
            }
        };

        let entries = match self.store.list_for_user(&identity.user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                let err = WatchlistError::PersistenceUnavailable(format!("{e:#}"));
                tracing::error!(user_id = %identity.user_id, error = %err, "failed to load watchlist");
                return Vec::new();
            }
        };

        if entries.is_empty() {
            return Vec::new();
        }

        enrich_entries(self.market.as_ref(), &entries).await
    }

    pub async fn add(
        &self,
        session: &dyn SessionProvider,
        symbol: &str,
        company: &str,
    ) -> Result<(), WatchlistError> {
        let identity = require_identity(session).await?;
        let symbol = normalize_symbol(symbol);

        let existing = self
            .store
            .find(&identity.user_id, &symbol)
            .await
            .map_err(|e| persistence("find", &e))?;
        if existing.is_some() {
            return Err(WatchlistError::DuplicateEntry { symbol });
        }

        let entry = WatchlistEntry::new(&identity.user_id, &symbol, company, chrono::Utc::now());
        match self.store.insert(&entry).await {
            Ok(InsertOutcome::Inserted) => {}
            // Lost a race against a concurrent add of the same pair.
            Ok(InsertOutcome::Duplicate) => return Err(WatchlistError::DuplicateEntry { symbol }),
            Err(e) => return Err(persistence("insert", &e)),
        }

        tracing::info!(user_id = %identity.user_id, %symbol, "added to watchlist");
        self.invalidate_views();
        Ok(())
    }

    pub async fn remove(&self, session: &dyn SessionProvider, symbol: &str) -> Result<(), WatchlistError> {
        let identity = require_identity(session).await?;
        let symbol = normalize_symbol(symbol);

        let deleted = self
            .store
            .delete(&identity.user_id, &symbol)
            .await
            .map_err(|e| persistence("delete", &e))?;
        if deleted == 0 {
            return Err(WatchlistError::NotFound { symbol });
        }

        tracing::info!(user_id = %identity.user_id, %symbol, "removed from watchlist");
        self.invalidate_views();
        Ok(())
    }

    /// `false` for anonymous callers and on any lookup failure.
    pub async fn is_in_watchlist(&self, session: &dyn SessionProvider, symbol: &str) -> bool {
        let Ok(Some(identity)) = session.current_session().await else {
            return false;
        };
        match self.store.find(&identity.user_id, &normalize_symbol(symbol)).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::error!(error = %e, "watchlist membership lookup failed");
                false
            }
        }
    }

    /// Symbols on the watchlist of the user with this email. Empty when the user is unknown.
    pub async fn symbols_by_email(&self, email: &str) -> Vec<String> {
        let email = email.trim();
        if email.is_empty() {
            return Vec::new();
        }

        self.try_symbols_by_email(email).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load watchlist symbols by email");
            Vec::new()
        })
    }

    async fn try_symbols_by_email(&self, email: &str) -> anyhow::Result<Vec<String>> {
        let Some(user_id) = self.store.user_id_by_email(email).await? else {
            return Ok(Vec::new());
        };
        let entries = self.store.list_for_user(&user_id).await?;
        Ok(entries.into_iter().map(|e| e.symbol).collect())
    }

    /// Symbol search annotated with the caller's watchlist membership.
    pub async fn search_stocks(
        &self,
        session: &dyn SessionProvider,
        query: &str,
    ) -> anyhow::Result<Vec<StockSearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let watched = self.watched_symbols(session).await;
        search_symbols(self.market.as_ref(), query, &watched).await
    }

    async fn watched_symbols(&self, session: &dyn SessionProvider) -> HashSet<String> {
        let Ok(Some(identity)) = session.current_session().await else {
            return HashSet::new();
        };
        match self.store.list_for_user(&identity.user_id).await {
            Ok(entries) => entries.into_iter().map(|e| e.symbol).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "watchlist lookup for search failed");
                HashSet::new()
            }
        }
    }

    fn invalidate_views(&self) {
        self.views.invalidate(WATCHLIST_VIEW);
        self.views.invalidate(STOCK_DETAIL_VIEW);
    }
}

/// Market symbol search; results whose symbol is in `watched` are flagged as watched.
pub async fn search_symbols(
    market: &dyn MarketDataClient,
    query: &str,
    watched: &HashSet<String>,
) -> anyhow::Result<Vec<StockSearchResult>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let matches = market.search(query).await?;
    Ok(matches
        .into_iter()
        .map(|m| {
            let symbol = normalize_symbol(&m.symbol);
            StockSearchResult {
                is_in_watchlist: watched.contains(&symbol),
                name: m.description,
                display_symbol: m.display_symbol,
                kind: m.kind,
                symbol,
            }
        })
        .collect())
}

async fn require_identity(session: &dyn SessionProvider) -> Result<Identity, WatchlistError> {
    match session.current_session().await {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => Err(WatchlistError::Unauthenticated),
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            Err(WatchlistError::Unauthenticated)
        }
    }
}

fn persistence(op: &str, err: &anyhow::Error) -> WatchlistError {
    tracing::error!(op, error = %err, "watchlist storage failed");
    WatchlistError::PersistenceUnavailable(format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::tests::FakeMarket;
    use crate::invalidate::ViewRevisions;
    use crate::market::types::SymbolMatch;
    use crate::storage::memory::MemoryStore;

    struct BrokenStore;

    #[async_trait::async_trait]
    impl WatchlistStore for BrokenStore {
        async fn list_for_user(&self, _: &str) -> anyhow::Result<Vec<WatchlistEntry>> {
            anyhow::bail!("connection refused")
        }
        async fn find(&self, _: &str, _: &str) -> anyhow::Result<Option<WatchlistEntry>> {
            anyhow::bail!("connection refused")
        }
        async fn insert(&self, _: &WatchlistEntry) -> anyhow::Result<InsertOutcome> {
            anyhow::bail!("connection refused")
        }
        async fn delete(&self, _: &str, _: &str) -> anyhow::Result<u64> {
            anyhow::bail!("connection refused")
        }
        async fn user_id_by_email(&self, _: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }
    }

    struct FailingSession;

    #[async_trait::async_trait]
    impl SessionProvider for FailingSession {
        async fn current_session(&self) -> anyhow::Result<Option<Identity>> {
            anyhow::bail!("auth backend down")
        }
    }

    fn user(id: &str) -> Option<Identity> {
        Some(Identity {
            user_id: id.to_string(),
            email: None,
        })
    }

    struct Harness {
        store: Arc<MemoryStore>,
        views: Arc<ViewRevisions>,
        service: WatchlistService,
    }

    fn harness(market: FakeMarket) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let views = Arc::new(ViewRevisions::new());
        let service = WatchlistService::new(store.clone(), Arc::new(market), views.clone());
        Harness {
            store,
            views,
            service,
        }
    }

    #[tokio::test]
    async fn add_normalizes_and_rejects_duplicates() {
        let h = harness(FakeMarket::default());
        let me = user("u1");

        h.service.add(&me, " aapl ", " Apple Inc ").await.unwrap();
        let err = h.service.add(&me, "AAPL", "Apple").await.unwrap_err();
        assert_eq!(err, WatchlistError::DuplicateEntry { symbol: "AAPL".into() });
        assert_eq!(h.store.count("u1", "AAPL").await, 1);

        let stored = h.store.find("u1", "AAPL").await.unwrap().unwrap();
        assert_eq!(stored.company, "Apple Inc");

        // Another user may watch the same symbol.
        h.service.add(&user("u2"), "aapl", "Apple").await.unwrap();
        assert_eq!(h.store.count("u2", "AAPL").await, 1);
    }

    #[tokio::test]
    async fn mutations_require_a_session() {
        let h = harness(FakeMarket::default());
        assert_eq!(
            h.service.add(&None::<Identity>, "AAPL", "Apple").await.unwrap_err(),
            WatchlistError::Unauthenticated
        );
        assert_eq!(
            h.service.remove(&FailingSession, "AAPL").await.unwrap_err(),
            WatchlistError::Unauthenticated
        );
        assert_eq!(h.views.revision(WATCHLIST_VIEW), 0);
    }

    #[tokio::test]
    async fn remove_missing_entry_is_not_found_and_changes_nothing() {
        let h = harness(FakeMarket::default());
        let me = user("u1");
        h.service.add(&me, "MSFT", "Microsoft").await.unwrap();
        let rev = h.views.revision(WATCHLIST_VIEW);

        let err = h.service.remove(&me, "aapl").await.unwrap_err();
        assert_eq!(err, WatchlistError::NotFound { symbol: "AAPL".into() });
        assert_eq!(h.store.count("u1", "MSFT").await, 1);
        assert_eq!(h.views.revision(WATCHLIST_VIEW), rev);

        h.service.remove(&me, "msft").await.unwrap();
        assert_eq!(h.store.count("u1", "MSFT").await, 0);
        assert_eq!(h.views.revision(WATCHLIST_VIEW), rev + 1);
        assert_eq!(h.views.revision(STOCK_DETAIL_VIEW), 2);
    }

    #[tokio::test]
    async fn watchlist_is_empty_for_anonymous_or_broken_sessions() {
        let h = harness(FakeMarket::default());
        h.service.add(&user("u1"), "AAPL", "Apple").await.unwrap();

        assert!(h.service.watchlist_with_data(&None::<Identity>).await.is_empty());
        assert!(h.service.watchlist_with_data(&FailingSession).await.is_empty());
        assert!(h.service.watchlist_with_data(&user("u2")).await.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_empty_or_error() {
        let service = WatchlistService::new(
            Arc::new(BrokenStore),
            Arc::new(FakeMarket::default()),
            Arc::new(ViewRevisions::new()),
        );
        let me = user("u1");
        assert!(service.watchlist_with_data(&me).await.is_empty());
        assert!(matches!(
            service.add(&me, "AAPL", "Apple").await,
            Err(WatchlistError::PersistenceUnavailable(_))
        ));
        assert!(matches!(
            service.remove(&me, "AAPL").await,
            Err(WatchlistError::PersistenceUnavailable(_))
        ));
        assert!(!service.is_in_watchlist(&me, "AAPL").await);
        assert!(service.symbols_by_email("a@b.c").await.is_empty());
    }

    #[tokio::test]
    async fn watchlist_is_newest_first_with_degraded_rows() {
        let mut market = FakeMarket::default()
            .with("AAPL", 123.4, 2.5, 2500.0)
            .with("NVDA", 900.0, 1.0, 2200.0);
        market.failing_quotes.insert("MSFT".into());
        let h = harness(market);
        let me = user("u1");

        for (sym, co) in [("AAPL", "Apple"), ("MSFT", "Microsoft"), ("NVDA", "Nvidia")] {
            h.service.add(&me, sym, co).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let rows = h.service.watchlist_with_data(&me).await;
        let symbols: Vec<_> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["NVDA", "MSFT", "AAPL"]);
        assert!(rows[1].is_unavailable());
        assert_eq!(rows[2].price_formatted, "$123.40");
    }

    #[tokio::test]
    async fn membership_and_symbols_by_email() {
        let h = harness(FakeMarket::default());
        h.store.add_user("u1", "ada@example.com").await;
        let me = user("u1");
        h.service.add(&me, "aapl", "Apple").await.unwrap();

        assert!(h.service.is_in_watchlist(&me, " aapl").await);
        assert!(!h.service.is_in_watchlist(&me, "MSFT").await);
        assert!(!h.service.is_in_watchlist(&None::<Identity>, "AAPL").await);

        assert_eq!(h.service.symbols_by_email("ada@example.com").await, ["AAPL"]);
        assert!(h.service.symbols_by_email("nobody@example.com").await.is_empty());
        assert!(h.service.symbols_by_email("  ").await.is_empty());
    }

    #[tokio::test]
    async fn search_marks_watched_symbols() {
        let mut market = FakeMarket::default();
        market.searchable = vec![
            SymbolMatch {
                symbol: "AAPL".into(),
                description: "Apple Inc".into(),
                display_symbol: "AAPL".into(),
                kind: "Common Stock".into(),
            },
            SymbolMatch {
                symbol: "APLE".into(),
                description: "Apple Hospitality REIT".into(),
                display_symbol: "APLE".into(),
                kind: "REIT".into(),
            },
        ];
        let h = harness(market);
        let me = user("u1");
        h.service.add(&me, "AAPL", "Apple").await.unwrap();

        let hits = h.service.search_stocks(&me, "apple").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].is_in_watchlist);
        assert!(!hits[1].is_in_watchlist);
        assert_eq!(hits[1].name, "Apple Hospitality REIT");

        let anon = h.service.search_stocks(&None::<Identity>, "apple").await.unwrap();
        assert!(anon.iter().all(|s| !s.is_in_watchlist));
        assert!(h.service.search_stocks(&me, " ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_add_and_remove_leave_at_most_one_record() {
        for _ in 0..20 {
            let h = harness(FakeMarket::default());
            let me = user("u1");
            let (a, b, c) = tokio::join!(
                h.service.add(&me, "AAPL", "Apple"),
                h.service.add(&me, "aapl", "Apple"),
                h.service.remove(&me, "AAPL"),
            );
            let n = h.store.count("u1", "AAPL").await;
            assert!(n <= 1);
            // Exactly one of the two adds wins.
            assert!(a.is_ok() != b.is_ok() || c.is_ok());
            if c.is_err() {
                assert_eq!(n, 1);
            }
        }
    }
}
