use crate::session::{Identity, SessionStore};
use anyhow::Context;

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: sqlx::PgPool,
}

impl PgSessionStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn lookup(&self, token: &str) -> anyhow::Result<Option<Identity>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT u.id, u.email \
             FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = $1 AND s.expires_at > now() \
             LIMIT 1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("select sessions failed")?;

        Ok(row.map(|(user_id, email)| Identity {
            user_id,
            email: Some(email),
        }))
    }
}
