use serde::{Deserialize, Serialize};

/// `/quote` payload. Field names follow the provider's single-letter keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(rename = "c", default)]
    pub current_price: Option<f64>,
    #[serde(rename = "d", default)]
    pub change: Option<f64>,
    #[serde(rename = "dp", default)]
    pub percent_change: Option<f64>,
    #[serde(rename = "h", default)]
    pub high: Option<f64>,
    #[serde(rename = "l", default)]
    pub low: Option<f64>,
    #[serde(rename = "o", default)]
    pub open: Option<f64>,
    #[serde(rename = "pc", default)]
    pub previous_close: Option<f64>,
    #[serde(rename = "t", default)]
    pub timestamp: Option<i64>,
}

/// `/stock/profile2` payload. Unknown symbols and most funds come back as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub finnhub_industry: Option<String>,
    /// In millions of the listing currency.
    #[serde(default)]
    pub market_capitalization: Option<f64>,
    #[serde(default)]
    pub share_outstanding: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub result: Vec<SymbolMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_symbol: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}
