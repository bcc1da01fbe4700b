pub mod memory;
pub mod sessions;
pub mod watchlist;

use crate::domain::entry::WatchlistEntry;
use anyhow::Context;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record for the same (user, symbol) already existed.
    Duplicate,
}

/// Persistence for watchlist entries keyed by (user_id, symbol). Symbols passed in are already
/// normalized.
#[async_trait::async_trait]
pub trait WatchlistStore: Send + Sync {
    /// All entries of a user, most recently added first.
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<WatchlistEntry>>;

    async fn find(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<WatchlistEntry>>;

    async fn insert(&self, entry: &WatchlistEntry) -> anyhow::Result<InsertOutcome>;

    /// Returns the number of deleted records.
    async fn delete(&self, user_id: &str, symbol: &str) -> anyhow::Result<u64>;

    async fn user_id_by_email(&self, email: &str) -> anyhow::Result<Option<String>>;
}
