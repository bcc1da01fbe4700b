use crate::domain::entry::WatchlistEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNAVAILABLE: &str = "N/A";

/// A watchlist entry joined with live market data, built per read request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStock {
    pub user_id: String,
    pub symbol: String,
    pub company: String,
    pub added_at: DateTime<Utc>,
    pub current_price: Option<f64>,
    pub change_percent: Option<f64>,
    pub price_formatted: String,
    pub change_formatted: String,
    pub market_cap: String,
    pub pe_ratio: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
    Flat,
}

impl EnrichedStock {
    pub fn from_market(
        entry: &WatchlistEntry,
        current_price: Option<f64>,
        change_percent: Option<f64>,
        market_capitalization: Option<f64>,
    ) -> Self {
        let current_price = present(current_price);
        let change_percent = present(change_percent);
        Self {
            user_id: entry.user_id.clone(),
            symbol: entry.symbol.clone(),
            company: entry.company.clone(),
            added_at: entry.added_at,
            current_price,
            change_percent,
            price_formatted: format_price(current_price),
            change_formatted: format_change(change_percent),
            market_cap: format_market_cap(market_capitalization),
            pe_ratio: UNAVAILABLE.to_string(),
        }
    }

    /// Degraded row for a symbol whose market data could not be fetched.
    pub fn unavailable(entry: &WatchlistEntry) -> Self {
        Self::from_market(entry, None, None, None)
    }

    pub fn is_unavailable(&self) -> bool {
        self.current_price.is_none()
            && self.change_percent.is_none()
            && self.price_formatted == UNAVAILABLE
            && self.change_formatted == UNAVAILABLE
            && self.market_cap == UNAVAILABLE
    }

    pub fn direction(&self) -> ChangeDirection {
        match self.change_percent {
            Some(v) if v > 0.0 => ChangeDirection::Up,
            Some(v) if v < 0.0 => ChangeDirection::Down,
            _ => ChangeDirection::Flat,
        }
    }
}

// Finnhub reports 0 for unknown symbols, so zero counts as missing.
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

pub fn format_price(price: Option<f64>) -> String {
    match present(price) {
        Some(p) => format!("${}", to_fixed(p, 2)),
        None => UNAVAILABLE.to_string(),
    }
}

pub fn format_change(change_percent: Option<f64>) -> String {
    match present(change_percent) {
        Some(c) => {
            let sign = if c > 0.0 { "+" } else { "" };
            format!("{sign}{}%", to_fixed(c, 2))
        }
        None => UNAVAILABLE.to_string(),
    }
}

/// Values above 1000 render as trillions of the raw value / 1000; everything else keeps the raw
/// value with a `B` suffix. The unit mismatch between the branches is intentional.
pub fn format_market_cap(market_capitalization: Option<f64>) -> String {
    match present(market_capitalization) {
        Some(m) if m > 1000.0 => format!("${}T", to_fixed(m / 1000.0, 1)),
        Some(m) => format!("${}B", to_fixed(m, 1)),
        None => UNAVAILABLE.to_string(),
    }
}

// Digits printed past the requested precision before deciding the rounding. Rust prints the
// exact binary value, so a stored 0.1499.. is not mistaken for the midpoint 0.15.
const GUARD_DIGITS: usize = 30;

/// Fixed-point rendering that rounds the exact value of the double half away from zero, like
/// `Number.prototype.toFixed`.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let expanded = format!("{:.*}", digits + GUARD_DIGITS, value.abs());
    let (kept, dropped) = expanded.split_at(expanded.len() - GUARD_DIGITS);
    let kept = kept.trim_end_matches('.');

    let mut out: Vec<char> = kept.chars().collect();
    if matches!(dropped.as_bytes().first(), Some(b'5'..=b'9')) {
        round_up(&mut out);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{}", out.into_iter().collect::<String>())
}

fn round_up(digits: &mut Vec<char>) {
    for c in digits.iter_mut().rev() {
        match *c {
            '.' => continue,
            '9' => *c = '0',
            d => {
                *c = char::from(d as u8 + 1);
                return;
            }
        }
    }
    digits.insert(0, '1');
}
