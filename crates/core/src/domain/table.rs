use crate::domain::enriched::EnrichedStock;
use serde::{Deserialize, Serialize};

pub const ITEMS_PER_PAGE: usize = 10;
const MAX_PAGE_BUTTONS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistPage {
    pub items: Vec<EnrichedStock>,
    pub page: usize,
    pub total_pages: usize,
    /// 1-based index of the first row on this page (0 when empty).
    pub start: usize,
    /// 1-based index of the last row on this page (0 when empty).
    pub end: usize,
    /// Rows after filtering.
    pub total: usize,
    /// Rows before filtering.
    pub watchlist_size: usize,
    pub page_buttons: Vec<usize>,
}

/// Case-insensitive substring match against symbol or company.
pub fn filter_watchlist<'a>(items: &'a [EnrichedStock], term: &str) -> Vec<&'a EnrichedStock> {
    let term = term.trim().to_lowercase();
    items
        .iter()
        .filter(|s| {
            term.is_empty()
                || s.symbol.to_lowercase().contains(&term)
                || s.company.to_lowercase().contains(&term)
        })
        .collect()
}

pub fn total_pages(len: usize) -> usize {
    len.div_ceil(ITEMS_PER_PAGE)
}

pub fn paginate(items: Vec<EnrichedStock>, term: &str, page: usize) -> WatchlistPage {
    let watchlist_size = items.len();
    let filtered: Vec<EnrichedStock> = filter_watchlist(&items, term).into_iter().cloned().collect();
    let total = filtered.len();
    let total_pages = total_pages(total);
    let page = page.clamp(1, total_pages.max(1));

    let start_idx = (page - 1) * ITEMS_PER_PAGE;
    let end_idx = (start_idx + ITEMS_PER_PAGE).min(total);
    let rows: Vec<EnrichedStock> = filtered
        .into_iter()
        .skip(start_idx)
        .take(end_idx.saturating_sub(start_idx))
        .collect();

    let (start, end) = if rows.is_empty() {
        (0, 0)
    } else {
        (start_idx + 1, end_idx)
    };

    WatchlistPage {
        items: rows,
        page,
        total_pages,
        start,
        end,
        total,
        watchlist_size,
        page_buttons: page_window(page, total_pages),
    }
}

/// Up to five page numbers centred on the current page where possible.
pub fn page_window(current: usize, total_pages: usize) -> Vec<usize> {
    let count = total_pages.min(MAX_PAGE_BUTTONS);
    let first = if total_pages <= MAX_PAGE_BUTTONS || current <= 3 {
        1
    } else if current + 2 >= total_pages {
        total_pages - (MAX_PAGE_BUTTONS - 1)
    } else {
        current - 2
    };
    (first..first + count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::WatchlistEntry;
    use chrono::{Duration, TimeZone, Utc};

    fn rows(n: usize) -> Vec<EnrichedStock> {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let e = WatchlistEntry::new(
                    "u",
                    &format!("SYM{i}"),
                    &format!("Company {i}"),
                    base + Duration::minutes(i as i64),
                );
                EnrichedStock::unavailable(&e)
            })
            .collect()
    }

    #[test]
    fn filter_matches_symbol_or_company_case_insensitively() {
        let mut items = rows(3);
        items[1].company = "Apple Inc".into();
        items[2].symbol = "MSFT".into();

        let hits = filter_watchlist(&items, "APPLE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].company, "Apple Inc");

        let hits = filter_watchlist(&items, "msf");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol, "MSFT");

        assert_eq!(filter_watchlist(&items, "  ").len(), 3);
    }

    #[test]
    fn paginates_in_pages_of_ten() {
        let page = paginate(rows(23), "", 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 3);
        assert_eq!((page.start, page.end, page.total), (21, 23, 23));
        assert_eq!(page.items[0].symbol, "SYM20");
    }

    #[test]
    fn clamps_out_of_range_page() {
        let page = paginate(rows(12), "", 9);
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 2);

        let page = paginate(rows(12), "", 0);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn empty_filter_result_has_zero_bounds() {
        let page = paginate(rows(4), "zzz", 1);
        assert_eq!(page.total, 0);
        assert_eq!(page.watchlist_size, 4);
        assert_eq!((page.start, page.end, page.total_pages), (0, 0, 0));
        assert!(page.page_buttons.is_empty());
    }

    #[test]
    fn page_window_follows_current_page() {
        assert_eq!(page_window(1, 3), vec![1, 2, 3]);
        assert_eq!(page_window(2, 9), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(5, 9), vec![3, 4, 5, 6, 7]);
        assert_eq!(page_window(8, 9), vec![5, 6, 7, 8, 9]);
        assert_eq!(page_window(9, 9), vec![5, 6, 7, 8, 9]);
        assert_eq!(page_window(1, 0), Vec::<usize>::new());
    }
}
