use crate::domain::entry::{sort_newest_first, WatchlistEntry};
use crate::session::{Identity, SessionStore};
use crate::storage::{InsertOutcome, WatchlistStore};
use std::collections::HashMap;

/// In-process store for local runs and tests. Enforces the same (user_id, symbol) uniqueness as
/// the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: tokio::sync::Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<WatchlistEntry>,
    users_by_email: HashMap<String, String>,
    sessions: HashMap<String, Identity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: &str, email: &str) {
        let mut g = self.inner.lock().await;
        g.users_by_email
            .insert(email.to_string(), user_id.to_string());
    }

    pub async fn add_session(&self, token: &str, identity: Identity) {
        let mut g = self.inner.lock().await;
        g.sessions.insert(token.to_string(), identity);
    }

    pub async fn count(&self, user_id: &str, symbol: &str) -> usize {
        let g = self.inner.lock().await;
        g.entries
            .iter()
            .filter(|e| e.user_id == user_id && e.symbol == symbol)
            .count()
    }
}

#[async_trait::async_trait]
impl WatchlistStore for MemoryStore {
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<WatchlistEntry>> {
        let g = self.inner.lock().await;
        let mut out: Vec<WatchlistEntry> = g
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }

    async fn find(&self, user_id: &str, symbol: &str) -> anyhow::Result<Option<WatchlistEntry>> {
        let g = self.inner.lock().await;
        Ok(g
            .entries
            .iter()
            .find(|e| e.user_id == user_id && e.symbol == symbol)
            .cloned())
    }

    async fn insert(&self, entry: &WatchlistEntry) -> anyhow::Result<InsertOutcome> {
        let mut g = self.inner.lock().await;
        let exists = g
            .entries
            .iter()
            .any(|e| e.user_id == entry.user_id && e.symbol == entry.symbol);
        if exists {
            return Ok(InsertOutcome::Duplicate);
        }
        g.entries.push(entry.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn delete(&self, user_id: &str, symbol: &str) -> anyhow::Result<u64> {
        let mut g = self.inner.lock().await;
        let before = g.entries.len();
        g.entries
            .retain(|e| !(e.user_id == user_id && e.symbol == symbol));
        Ok((before - g.entries.len()) as u64)
    }

    async fn user_id_by_email(&self, email: &str) -> anyhow::Result<Option<String>> {
        let g = self.inner.lock().await;
        Ok(g.users_by_email.get(email).cloned())
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn lookup(&self, token: &str) -> anyhow::Result<Option<Identity>> {
        let g = self.inner.lock().await;
        Ok(g.sessions.get(token).cloned())
    }
}
