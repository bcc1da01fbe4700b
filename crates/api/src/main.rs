use std::sync::Arc;

use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchlist_core::invalidate::ViewRevisions;
use watchlist_core::market::cache::{CachePolicy, CachedMarketData};
use watchlist_core::market::finnhub::FinnhubClient;
use watchlist_core::market::MarketDataClient;
use watchlist_core::service::WatchlistService;
use watchlist_core::storage::sessions::PgSessionStore;
use watchlist_core::storage::watchlist::PgWatchlistStore;

mod routes;

use routes::{AppState, WatchlistBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = watchlist_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match watchlist_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let market: Arc<dyn MarketDataClient> = Arc::new(CachedMarketData::new(
        FinnhubClient::from_settings(&settings)?,
        CachePolicy::from_settings(&settings),
    ));
    let views = Arc::new(ViewRevisions::new());

    let watchlist = pool.map(|pool| WatchlistBackend {
        service: WatchlistService::new(
            Arc::new(PgWatchlistStore::new(pool.clone())),
            market.clone(),
            views.clone(),
        ),
        sessions: Arc::new(PgSessionStore::new(pool)),
    });

    let state = AppState {
        watchlist,
        market,
        views,
        internal_api_key: settings.internal_api_key.clone(),
    };

    let app = routes::router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &watchlist_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
