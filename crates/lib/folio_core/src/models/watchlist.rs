//! Watchlist and market-data domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation status of a watchlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Pending,
    Accepted,
    Rejected,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Pending => "pending",
            WatchStatus::Accepted => "accepted",
            WatchStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(WatchStatus::Pending),
            "accepted" => Some(WatchStatus::Accepted),
            "rejected" => Some(WatchStatus::Rejected),
            _ => None,
        }
    }
}

/// One symbol on a user's watchlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub id: String,
    pub symbol: String,
    pub status: WatchStatus,
    pub added_at: DateTime<Utc>,
}

/// Real-time quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub current_price: f64,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub high_price: f64,
    pub low_price: f64,
    pub open_price: f64,
    pub previous_close_price: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One reported earnings period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    pub period: String,
    pub actual: Option<f64>,
    pub estimate: Option<f64>,
    pub surprise: Option<f64>,
    pub surprise_percent: Option<f64>,
}

/// Per-symbol outcome of a fan-out to the market-data provider.
///
/// Failures never fail the whole request; they are reported per symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SymbolResult<T> {
    Ok { symbol: String, data: T },
    Failed { symbol: String, error: String },
}

/// One hit from the provider's symbol search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    pub symbol: String,
    pub display_symbol: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}
