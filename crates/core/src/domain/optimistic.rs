//! Client-side optimistic state for watchlist toggles.
//!
//! A toggle is applied locally before the server confirms it and rolled back when the server
//! reports a failure.

use crate::domain::enriched::EnrichedStock;
use crate::error::MutationOutcome;

const FALLBACK_FAILURE: &str = "Operation failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

/// State of a single add/remove button.
#[derive(Debug, Clone)]
pub struct WatchToggle {
    symbol: String,
    added: bool,
    pending: Option<bool>,
}

impl WatchToggle {
    pub fn new(symbol: &str, added: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            added,
            pending: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_added(&self) -> bool {
        self.added
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// While a toggle is in flight the label names the action being sent, which is decided by
    /// the state before the flip.
    pub fn label(&self) -> &'static str {
        match self.pending {
            Some(true) => "Removing...",
            Some(false) => "Adding...",
            None if self.added => "Remove from Watchlist",
            None => "Add to Watchlist",
        }
    }

    /// Flips the local state and returns the action to send, or `None` while a toggle is in
    /// flight.
    pub fn begin(&mut self) -> Option<ToggleAction> {
        if self.pending.is_some() {
            return None;
        }
        let previous = self.added;
        self.added = !previous;
        self.pending = Some(previous);
        Some(if self.added {
            ToggleAction::Add
        } else {
            ToggleAction::Remove
        })
    }

    /// Applies the server result: keeps the optimistic state on success, restores the previous
    /// state otherwise.
    pub fn settle(&mut self, outcome: &MutationOutcome) -> Notification {
        let Some(previous) = self.pending.take() else {
            return Notification::Error(FALLBACK_FAILURE.to_string());
        };

        if outcome.success {
            let verb = if self.added { "added to" } else { "removed from" };
            return Notification::Success(format!("{} {verb} watchlist", self.symbol));
        }

        self.added = previous;
        Notification::Error(
            outcome
                .error
                .clone()
                .unwrap_or_else(|| FALLBACK_FAILURE.to_string()),
        )
    }

    /// Rolls back after a transport failure where no outcome was received.
    pub fn abort(&mut self) -> Notification {
        if let Some(previous) = self.pending.take() {
            self.added = previous;
        }
        Notification::Error("Something went wrong. Please try again.".to_string())
    }
}

/// Rows shown in the watchlist table, with rows removed optimistically until confirmed.
#[derive(Debug, Clone, Default)]
pub struct LocalWatchlist {
    rows: Vec<EnrichedStock>,
}

#[derive(Debug, Clone)]
pub struct RemovedRow {
    index: usize,
    row: EnrichedStock,
}

impl LocalWatchlist {
    pub fn new(rows: Vec<EnrichedStock>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[EnrichedStock] {
        &self.rows
    }

    pub fn remove_optimistic(&mut self, symbol: &str) -> Option<RemovedRow> {
        let index = self.rows.iter().position(|r| r.symbol == symbol)?;
        let row = self.rows.remove(index);
        Some(RemovedRow { index, row })
    }

    /// Puts a row back at its original position.
    pub fn restore(&mut self, removed: RemovedRow) {
        let index = removed.index.min(self.rows.len());
        self.rows.insert(index, removed.row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::WatchlistEntry;
    use crate::error::WatchlistError;
    use chrono::Utc;

    #[test]
    fn successful_add_keeps_optimistic_state() {
        let mut t = WatchToggle::new("AAPL", false);
        assert_eq!(t.begin(), Some(ToggleAction::Add));
        assert!(t.is_added());
        assert_eq!(t.label(), "Adding...");
        assert_eq!(t.begin(), None);

        let n = t.settle(&MutationOutcome::ok());
        assert_eq!(n, Notification::Success("AAPL added to watchlist".into()));
        assert!(t.is_added());
        assert!(!t.is_pending());
        assert_eq!(t.label(), "Remove from Watchlist");
    }

    #[test]
    fn failed_remove_reverts() {
        let mut t = WatchToggle::new("MSFT", true);
        assert_eq!(t.label(), "Remove from Watchlist");
        assert_eq!(t.begin(), Some(ToggleAction::Remove));
        assert!(!t.is_added());
        assert_eq!(t.label(), "Removing...");

        let outcome = MutationOutcome::failed(&WatchlistError::NotFound {
            symbol: "MSFT".into(),
        });
        let n = t.settle(&outcome);
        assert_eq!(n, Notification::Error("Stock not found in watchlist".into()));
        assert!(t.is_added());
    }

    #[test]
    fn abort_reverts_without_outcome() {
        let mut t = WatchToggle::new("NVDA", false);
        t.begin();
        assert!(matches!(t.abort(), Notification::Error(_)));
        assert!(!t.is_added());
        assert!(!t.is_pending());
    }

    #[test]
    fn restore_puts_row_back_in_place() {
        let now = Utc::now();
        let rows: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|s| EnrichedStock::unavailable(&WatchlistEntry::new("u", s, s, now)))
            .collect();
        let mut local = LocalWatchlist::new(rows);

        let removed = local.remove_optimistic("B").unwrap();
        assert_eq!(local.rows().len(), 2);
        assert!(local.remove_optimistic("Z").is_none());

        local.restore(removed);
        let symbols: Vec<_> = local.rows().iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["A", "B", "C"]);
    }
}
