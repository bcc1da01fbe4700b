use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchlistError {
    Unauthenticated,
    DuplicateEntry { symbol: String },
    NotFound { symbol: String },
    UpstreamUnavailable { symbol: String, detail: String },
    PersistenceUnavailable(String),
}

impl WatchlistError {
    /// Short reason suitable for a user-facing notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            WatchlistError::Unauthenticated => "User not authenticated",
            WatchlistError::DuplicateEntry { .. } => "Stock already in watchlist",
            WatchlistError::NotFound { .. } => "Stock not found in watchlist",
            WatchlistError::UpstreamUnavailable { .. } => "Market data unavailable",
            WatchlistError::PersistenceUnavailable(_) => "Watchlist is temporarily unavailable",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchlistError::Unauthenticated => ErrorKind::Unauthenticated,
            WatchlistError::DuplicateEntry { .. } => ErrorKind::DuplicateEntry,
            WatchlistError::NotFound { .. } => ErrorKind::NotFound,
            WatchlistError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            WatchlistError::PersistenceUnavailable(_) => ErrorKind::PersistenceUnavailable,
        }
    }
}

impl fmt::Display for WatchlistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchlistError::Unauthenticated => write!(f, "no authenticated session"),
            WatchlistError::DuplicateEntry { symbol } => {
                write!(f, "{symbol} is already in the watchlist")
            }
            WatchlistError::NotFound { symbol } => write!(f, "{symbol} is not in the watchlist"),
            WatchlistError::UpstreamUnavailable { symbol, detail } => {
                write!(f, "market data unavailable for {symbol}: {detail}")
            }
            WatchlistError::PersistenceUnavailable(detail) => {
                write!(f, "watchlist storage unavailable: {detail}")
            }
        }
    }
}

impl std::error::Error for WatchlistError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    DuplicateEntry,
    NotFound,
    UpstreamUnavailable,
    PersistenceUnavailable,
}

/// Structured result of a watchlist mutation, returned to callers instead of a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl MutationOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            kind: None,
        }
    }

    pub fn failed(err: &WatchlistError) -> Self {
        Self {
            success: false,
            error: Some(err.user_message().to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl From<Result<(), WatchlistError>> for MutationOutcome {
    fn from(res: Result<(), WatchlistError>) -> Self {
        match res {
            Ok(()) => MutationOutcome::ok(),
            Err(err) => MutationOutcome::failed(&err),
        }
    }
}
