use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub company: String,
    pub added_at: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn new(user_id: &str, symbol: &str, company: &str, added_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            symbol: normalize_symbol(symbol),
            company: company.trim().to_string(),
            added_at,
        }
    }
}

/// Symbols are compared and stored trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Orders entries most-recently-added first. Ties keep their relative order.
pub fn sort_newest_first(entries: &mut [WatchlistEntry]) {
    entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["aapl", "  msft ", "BRK.b", "", "\tnvda\n", "ß"] {
            let once = normalize_symbol(raw);
            assert_eq!(normalize_symbol(&once), once, "input {raw:?}");
        }
        assert_eq!(normalize_symbol("  tsla "), "TSLA");
    }

    #[test]
    fn new_entry_normalizes_symbol_and_trims_company() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let e = WatchlistEntry::new("user-1", " aapl", "  Apple Inc ", at);
        assert_eq!(e.symbol, "AAPL");
        assert_eq!(e.company, "Apple Inc");
        assert_eq!(e.added_at, at);
    }

    #[test]
    fn sorts_newest_first() {
        let t = |d| Utc.with_ymd_and_hms(2026, 3, d, 0, 0, 0).unwrap();
        let mut entries = vec![
            WatchlistEntry::new("u", "A", "a", t(1)),
            WatchlistEntry::new("u", "C", "c", t(3)),
            WatchlistEntry::new("u", "B", "b", t(2)),
        ];
        sort_newest_first(&mut entries);
        let symbols: Vec<_> = entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, ["C", "B", "A"]);
    }
}
