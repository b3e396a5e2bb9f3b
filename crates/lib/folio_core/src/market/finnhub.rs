//! Finnhub market-data client.
//!
//! Authenticates with the `token` query parameter. Each call is bounded by
//! the configured request timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{MarketData, MarketDataError};
use crate::config::MarketDataConfig;
use crate::models::watchlist::{Earnings, Quote, SymbolMatch};

#[derive(Deserialize)]
struct QuoteResponse {
    c: f64,
    d: Option<f64>,
    dp: Option<f64>,
    h: f64,
    l: f64,
    o: f64,
    pc: f64,
    t: Option<i64>,
}

impl From<QuoteResponse> for Quote {
    fn from(r: QuoteResponse) -> Self {
        Quote {
            current_price: r.c,
            change: r.d,
            percent_change: r.dp,
            high_price: r.h,
            low_price: r.l,
            open_price: r.o,
            previous_close_price: r.pc,
            timestamp: r
                .t
                .filter(|t| *t > 0)
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    symbol: String,
    #[serde(default)]
    display_symbol: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsRow {
    period: String,
    actual: Option<f64>,
    estimate: Option<f64>,
    surprise: Option<f64>,
    surprise_percent: Option<f64>,
}

/// HTTP client for the Finnhub REST API.
#[derive(Debug, Clone)]
pub struct FinnhubClient {
    http: Client,
    config: MarketDataConfig,
}

impl FinnhubClient {
    pub fn new(config: MarketDataConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, MarketDataError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| MarketDataError::Request("base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MarketDataError> {
        let url = self.endpoint(path)?;
        debug!(%path, "finnhub request");

        let resp = self
            .http
            .get(url)
            .query(params)
            .query(&[("token", self.config.api_key.as_str())])
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout
                } else {
                    MarketDataError::Request(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(MarketDataError::Status { status, body });
        }

        resp.json()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketData for FinnhubClient {
    async fn symbol_search(&self, query: &str) -> Result<Vec<SymbolMatch>, MarketDataError> {
        let resp: SearchResponse = self.get("search", &[("q", query)]).await?;
        Ok(resp
            .result
            .into_iter()
            .map(|h| SymbolMatch {
                symbol: h.symbol,
                display_symbol: h.display_symbol,
                description: h.description,
                kind: h.kind,
            })
            .collect())
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let resp: QuoteResponse = self.get("quote", &[("symbol", symbol)]).await?;
        Ok(resp.into())
    }

    async fn earnings(&self, symbol: &str) -> Result<Vec<Earnings>, MarketDataError> {
        let rows: Vec<EarningsRow> = self.get("stock/earnings", &[("symbol", symbol)]).await?;
        Ok(rows
            .into_iter()
            .map(|r| Earnings {
                period: r.period,
                actual: r.actual,
                estimate: r.estimate,
                surprise: r.surprise,
                surprise_percent: r.surprise_percent,
            })
            .collect())
    }
}
