//! Market-data provider.
//!
//! The provider sits behind [`MarketData`] so handlers and tests never talk
//! to the network directly. [`finnhub::FinnhubClient`] is the production
//! implementation.

pub mod finnhub;

use std::future::Future;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::warn;

use crate::models::watchlist::{Earnings, Quote, SymbolMatch, SymbolResult};

pub use finnhub::FinnhubClient;

/// Market-data provider errors.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Market data provider not configured")]
    NotConfigured,

    #[error("Market data request failed: {0}")]
    Request(String),

    #[error("Market data provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Market data response parse error: {0}")]
    Decode(String),

    #[error("Market data request timed out")]
    Timeout,
}

/// Outbound market-data calls used by the watchlist.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Search symbols matching `query`.
    async fn symbol_search(&self, query: &str) -> Result<Vec<SymbolMatch>, MarketDataError>;

    /// Latest quote for `symbol`.
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Reported earnings periods for `symbol`, newest first.
    async fn earnings(&self, symbol: &str) -> Result<Vec<Earnings>, MarketDataError>;
}

/// Stand-in used when no provider key is configured. Every call fails, so
/// symbol verification is refused and fan-outs report per-symbol errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfigured;

#[async_trait]
impl MarketData for Unconfigured {
    async fn symbol_search(&self, _query: &str) -> Result<Vec<SymbolMatch>, MarketDataError> {
        Err(MarketDataError::NotConfigured)
    }

    async fn quote(&self, _symbol: &str) -> Result<Quote, MarketDataError> {
        Err(MarketDataError::NotConfigured)
    }

    async fn earnings(&self, _symbol: &str) -> Result<Vec<Earnings>, MarketDataError> {
        Err(MarketDataError::NotConfigured)
    }
}

/// Fetch `symbols` concurrently. A failed symbol becomes a
/// [`SymbolResult::Failed`] carrying `failure`; results keep input order.
pub async fn fan_out<T, F, Fut>(
    symbols: &[String],
    failure: &'static str,
    fetch: F,
) -> Vec<SymbolResult<T>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, MarketDataError>>,
{
    join_all(symbols.iter().map(|symbol| {
        let pending = fetch(symbol.clone());
        let symbol = symbol.clone();
        async move {
            match pending.await {
                Ok(data) => SymbolResult::Ok { symbol, data },
                Err(e) => {
                    warn!(%symbol, error = %e, "market data fetch failed");
                    SymbolResult::Failed {
                        symbol,
                        error: failure.to_string(),
                    }
                }
            }
        }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fan_out_reports_failures_per_symbol_in_order() {
        let symbols = vec!["AAPL".to_string(), "BOOM".to_string(), "MSFT".to_string()];
        let results = fan_out(&symbols, "Failed to fetch quote", |s| async move {
            if s == "BOOM" {
                Err(MarketDataError::Timeout)
            } else {
                Ok(s.len())
            }
        })
        .await;

        assert_eq!(
            results,
            vec![
                SymbolResult::Ok {
                    symbol: "AAPL".into(),
                    data: 4
                },
                SymbolResult::Failed {
                    symbol: "BOOM".into(),
                    error: "Failed to fetch quote".into()
                },
                SymbolResult::Ok {
                    symbol: "MSFT".into(),
                    data: 4
                },
            ]
        );
    }

    #[tokio::test]
    async fn fan_out_of_nothing_is_empty() {
        let results: Vec<SymbolResult<()>> =
            fan_out(&[], "unused", |_| async { Ok(()) }).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_provider_always_fails() {
        assert!(matches!(
            Unconfigured.quote("AAPL").await,
            Err(MarketDataError::NotConfigured)
        ));
        assert!(Unconfigured.symbol_search("AAPL").await.is_err());
    }
}
