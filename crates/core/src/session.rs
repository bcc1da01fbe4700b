use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

/// Resolves the identity behind the current request, if any.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> anyhow::Result<Option<Identity>>;
}

#[async_trait::async_trait]
impl SessionProvider for Option<Identity> {
    async fn current_session(&self) -> anyhow::Result<Option<Identity>> {
        Ok(self.clone())
    }
}

/// Looks up sessions issued by the auth service.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn lookup(&self, token: &str) -> anyhow::Result<Option<Identity>>;
}

/// Session of a request carrying an optional bearer token.
pub struct BearerSession<'a> {
    store: &'a dyn SessionStore,
    token: Option<String>,
}

impl<'a> BearerSession<'a> {
    pub fn new(store: &'a dyn SessionStore, token: Option<String>) -> Self {
        Self { store, token }
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header value.
    pub fn from_authorization(store: &'a dyn SessionStore, header: Option<&str>) -> Self {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self::new(store, token)
    }
}

#[async_trait::async_trait]
impl SessionProvider for BearerSession<'_> {
    async fn current_session(&self) -> anyhow::Result<Option<Identity>> {
        match self.token.as_deref() {
            Some(token) => self.store.lookup(token).await,
            None => Ok(None),
        }
    }
}
