use std::collections::HashMap;
use std::sync::Mutex;

pub const WATCHLIST_VIEW: &str = "/watchlist";
pub const STOCK_DETAIL_VIEW: &str = "/stocks/[symbol]";

/// Marks rendered views stale after the watchlist changes.
pub trait ViewInvalidator: Send + Sync {
    fn invalidate(&self, path: &str);
}

/// Per-path revision counters. Readers compare revisions to detect stale views.
#[derive(Debug, Default)]
pub struct ViewRevisions {
    revisions: Mutex<HashMap<String, u64>>,
}

impl ViewRevisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self, path: &str) -> u64 {
        self.revisions
            .lock()
            .map(|g| g.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl ViewInvalidator for ViewRevisions {
    fn invalidate(&self, path: &str) {
        match self.revisions.lock() {
            Ok(mut g) => {
                let rev = g.entry(path.to_string()).or_insert(0);
                *rev += 1;
                tracing::debug!(path, revision = *rev, "view invalidated");
            }
            Err(_) => tracing::warn!(path, "view revision lock poisoned; skipping invalidation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_bumps_only_that_path() {
        let r = ViewRevisions::new();
        r.invalidate(WATCHLIST_VIEW);
        r.invalidate(WATCHLIST_VIEW);
        assert_eq!(r.revision(WATCHLIST_VIEW), 2);
        assert_eq!(r.revision(STOCK_DETAIL_VIEW), 0);
    }
}
