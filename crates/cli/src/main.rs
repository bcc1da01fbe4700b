use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchlist_core::domain::entry::normalize_symbol;
use watchlist_core::domain::optimistic::WatchToggle;

mod client;
mod render;
mod toggle;

use client::ApiClient;

#[derive(Debug, Parser)]
#[command(name = "watchlist", about = "Manage your stock watchlist")]
struct Args {
    /// Base URL of the watchlist API.
    #[arg(long, env = "WATCHLIST_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Session token issued at sign-in.
    #[arg(long, env = "WATCHLIST_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the watchlist with live prices.
    List {
        /// Filter by symbol or company name.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Add a stock to the watchlist.
    Add { symbol: String, company: String },
    /// Remove a stock from the watchlist.
    Remove { symbol: String },
    /// Check whether a stock is on the watchlist.
    Status { symbol: String },
    /// Search stocks by symbol or name.
    Search { query: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = watchlist_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let api = ApiClient::new(&args.api_url, args.token.clone())?;

    match args.command {
        Command::List { search, page } => {
            let search = search.filter(|s| !s.trim().is_empty());
            let page = api
                .list(search.as_deref(), page)
                .await
                .context("failed to load watchlist")?;
            print!("{}", render::watchlist_page(&page, search.as_deref()));
        }
        Command::Add { symbol, company } => {
            let mut toggle = WatchToggle::new(&normalize_symbol(&symbol), false);
            println!("{}", toggle::run(&api, &mut toggle, &company).await?);
        }
        Command::Remove { symbol } => {
            let mut toggle = WatchToggle::new(&normalize_symbol(&symbol), true);
            println!("{}", toggle::run(&api, &mut toggle, "").await?);
        }
        Command::Status { symbol } => {
            let symbol = normalize_symbol(&symbol);
            let added = api.is_in_watchlist(&symbol).await?;
            println!("{symbol}: {}", WatchToggle::new(&symbol, added).label());
        }
        Command::Search { query } => {
            let results = api.search(&query).await.context("stock search failed")?;
            print!("{}", render::search_results(&results));
        }
    }

    Ok(())
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
