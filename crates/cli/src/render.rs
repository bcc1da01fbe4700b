use std::fmt::Write;

use watchlist_core::domain::enriched::{ChangeDirection, EnrichedStock};
use watchlist_core::domain::table::WatchlistPage;
use watchlist_core::service::StockSearchResult;

pub fn watchlist_table(rows: &[EnrichedStock]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<28} {:>12} {:>10} {:>12}  {}",
        "SYMBOL", "COMPANY", "PRICE", "CHANGE", "MARKET CAP", "ADDED"
    );
    for row in rows {
        let arrow = match row.direction() {
            ChangeDirection::Up => "▲",
            ChangeDirection::Down => "▼",
            ChangeDirection::Flat => " ",
        };
        let _ = writeln!(
            out,
            "{:<8} {:<28} {:>12} {:>9}{} {:>12}  {}",
            row.symbol,
            truncate(&row.company, 28),
            row.price_formatted,
            row.change_formatted,
            arrow,
            row.market_cap,
            row.added_at.format("%Y-%m-%d"),
        );
    }
    out
}

pub fn watchlist_page(page: &WatchlistPage, search: Option<&str>) -> String {
    if page.watchlist_size == 0 {
        return "Your watchlist is empty. Search for stocks and add them to track their performance.\n"
            .to_string();
    }
    if page.items.is_empty() && search.is_some() {
        return "No stocks found matching your search.\n".to_string();
    }

    let mut out = watchlist_table(&page.items);
    if page.total_pages > 1 {
        let buttons: Vec<String> = page
            .page_buttons
            .iter()
            .map(|p| {
                if *p == page.page {
                    format!("[{p}]")
                } else {
                    p.to_string()
                }
            })
            .collect();
        let _ = writeln!(
            out,
            "Showing {} to {} of {} stocks   pages: {}",
            page.start,
            page.end,
            page.total,
            buttons.join(" ")
        );
    }
    out
}

pub fn search_results(results: &[StockSearchResult]) -> String {
    if results.is_empty() {
        return "No results found\n".to_string();
    }
    let mut out = String::new();
    for r in results {
        let star = if r.is_in_watchlist { "★" } else { "☆" };
        let _ = writeln!(out, "{star} {:<8} {} | {}", r.symbol, r.name, r.kind);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
    t.push('…');
    t
}
