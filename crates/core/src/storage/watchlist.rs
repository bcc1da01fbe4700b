use crate::domain::entry::WatchlistEntry;
use crate::storage::{InsertOutcome, WatchlistStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

type EntryRow = (Uuid, String, String, String, DateTime<Utc>);

#[derive(Debug, Clone)]
pub struct PgWatchlistStore {
    pool: sqlx::PgPool,
}

impl PgWatchlistStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn into_entry((id, user_id, symbol, company, added_at): EntryRow) -> WatchlistEntry {
    WatchlistEntry {
        id,
        user_id,
        symbol,
        company,
        added_at,
    }
}

#[async_trait::async_trait]
impl WatchlistStore for PgWatchlistStore {
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<WatchlistEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT id, user_id, symbol, company, added_at \
             FROM watchlist_entries \
             WHERE user_id = $1 \
             ORDER BY added_at DESC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select watchlist_entries failed (user_id={user_id})"))?;

        Ok(rows.into_iter().map(into_entry).collect())
    }

    async fn find(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<WatchlistEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT id, user_id, symbol, company, added_at \
             FROM watchlist_entries \
             WHERE user_id = $1 AND symbol = $2 \
             LIMIT 1",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .context("select watchlist_entries by symbol failed")?;

        Ok(row.map(into_entry))
    }

    async fn insert(&self, entry: &WatchlistEntry) -> anyhow::Result<InsertOutcome> {
        let res = sqlx::query(
            "INSERT INTO watchlist_entries (id, user_id, symbol, company, added_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT watchlist_entries_user_symbol_key DO NOTHING",
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.symbol)
        .bind(&entry.company)
        .bind(entry.added_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) if done.rows_affected() == 0 => Ok(InsertOutcome::Duplicate),
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e).context("insert watchlist_entries failed"),
        }
    }

    async fn delete(&self, user_id: &str, symbol: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM watchlist_entries WHERE user_id = $1 AND symbol = $2")
            .bind(user_id)
            .bind(symbol)
            .execute(&self.pool)
            .await
            .context("delete watchlist_entries failed")?;
        Ok(res.rows_affected())
    }

    async fn user_id_by_email(&self, email: &str) -> anyhow::Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("select users by email failed")?;
        Ok(id)
    }
}
