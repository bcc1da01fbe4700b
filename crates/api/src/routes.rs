use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use watchlist_core::domain::entry::normalize_symbol;
use watchlist_core::domain::table::{paginate, WatchlistPage};
use watchlist_core::error::{ErrorKind, MutationOutcome, WatchlistError};
use watchlist_core::invalidate::{ViewRevisions, WATCHLIST_VIEW};
use watchlist_core::market::MarketDataClient;
use watchlist_core::service::{search_symbols, StockSearchResult, WatchlistService};
use watchlist_core::session::{BearerSession, SessionStore};

const VIEW_REVISION_HEADER: HeaderName = HeaderName::from_static("x-view-revision");
const INTERNAL_KEY_HEADER: &str = "x-internal-key";

#[derive(Clone)]
pub struct WatchlistBackend {
    pub service: WatchlistService,
    pub sessions: Arc<dyn SessionStore>,
}

impl WatchlistBackend {
    fn session<'a>(&'a self, headers: &'a HeaderMap) -> BearerSession<'a> {
        let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        BearerSession::from_authorization(self.sessions.as_ref(), auth)
    }
}

/// `watchlist` is `None` when the database is unreachable at startup; `market` is shared with
/// the service and keeps search available without storage.
#[derive(Clone)]
pub struct AppState {
    pub watchlist: Option<WatchlistBackend>,
    pub market: Arc<dyn MarketDataClient>,
    pub views: Arc<ViewRevisions>,
    pub internal_api_key: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/watchlist", get(list_watchlist).post(add_to_watchlist))
        .route(
            "/watchlist/:symbol",
            get(watchlist_status).delete(remove_from_watchlist),
        )
        .route("/search", get(search_stocks))
        .route("/internal/watchlist-symbols", get(symbols_by_email))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    q: Option<String>,
    page: Option<usize>,
}

async fn list_watchlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ([(HeaderName, HeaderValue); 1], Json<WatchlistPage>) {
    let rows = match &state.watchlist {
        Some(backend) => {
            backend
                .service
                .watchlist_with_data(&backend.session(&headers))
                .await
        }
        None => {
            tracing::warn!("watchlist requested while storage is unavailable");
            Vec::new()
        }
    };

    let page = paginate(
        rows,
        query.q.as_deref().unwrap_or_default(),
        query.page.unwrap_or(1),
    );
    let revision = HeaderValue::from(state.views.revision(WATCHLIST_VIEW));
    ([(VIEW_REVISION_HEADER, revision)], Json(page))
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    symbol: String,
    company: String,
}

async fn add_to_watchlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddRequest>,
) -> (StatusCode, Json<MutationOutcome>) {
    if normalize_symbol(&req.symbol).is_empty() {
        let outcome = MutationOutcome {
            success: false,
            error: Some("Symbol is required".to_string()),
            kind: None,
        };
        return (StatusCode::BAD_REQUEST, Json(outcome));
    }

    let Some(backend) = &state.watchlist else {
        return unavailable();
    };
    let res = backend
        .service
        .add(&backend.session(&headers), &req.symbol, &req.company)
        .await;
    mutation_response(res)
}

async fn remove_from_watchlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(symbol): Path<String>,
) -> (StatusCode, Json<MutationOutcome>) {
    let Some(backend) = &state.watchlist else {
        return unavailable();
    };
    let res = backend
        .service
        .remove(&backend.session(&headers), &symbol)
        .await;
    mutation_response(res)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    symbol: String,
    is_in_watchlist: bool,
}

async fn watchlist_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(symbol): Path<String>,
) -> Json<StatusResponse> {
    let is_in_watchlist = match &state.watchlist {
        Some(backend) => {
            backend
                .service
                .is_in_watchlist(&backend.session(&headers), &symbol)
                .await
        }
        None => false,
    };
    Json(StatusResponse {
        symbol: normalize_symbol(&symbol),
        is_in_watchlist,
    })
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn search_stocks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StockSearchResult>>, StatusCode> {
    let q = query.q.unwrap_or_default();
    let results = match &state.watchlist {
        Some(backend) => {
            backend
                .service
                .search_stocks(&backend.session(&headers), &q)
                .await
        }
        None => search_symbols(state.market.as_ref(), &q, &HashSet::new()).await,
    };
    let results = results.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, query = %q, "stock search failed");
        StatusCode::BAD_GATEWAY
    })?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: String,
}

#[derive(Debug, Serialize)]
struct SymbolsResponse {
    email: String,
    symbols: Vec<String>,
}

async fn symbols_by_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EmailQuery>,
) -> Result<Json<SymbolsResponse>, StatusCode> {
    let Some(expected) = state.internal_api_key.as_deref() else {
        return Err(StatusCode::NOT_FOUND);
    };
    let provided = headers
        .get(INTERNAL_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let symbols = match &state.watchlist {
        Some(backend) => backend.service.symbols_by_email(&query.email).await,
        None => Vec::new(),
    };
    Ok(Json(SymbolsResponse {
        email: query.email,
        symbols,
    }))
}

fn mutation_response(res: Result<(), WatchlistError>) -> (StatusCode, Json<MutationOutcome>) {
    let status = match &res {
        Ok(()) => StatusCode::OK,
        Err(err) => status_for(err.kind()),
    };
    (status, Json(MutationOutcome::from(res)))
}

fn unavailable() -> (StatusCode, Json<MutationOutcome>) {
    let err = WatchlistError::PersistenceUnavailable("database not connected".to_string());
    mutation_response(Err(err))
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::DuplicateEntry => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::PersistenceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}
