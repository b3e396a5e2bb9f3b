//! Per-user watchlists and the market data shown for them.
//!
//! Symbols are verified against the market-data provider before they are
//! stored, and enter the list as `pending`. Quotes and earnings are only
//! fetched for `accepted` symbols.

pub mod memory;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::market::{MarketData, fan_out};
use crate::models::watchlist::{Earnings, Quote, SymbolResult, WatchStatus, WatchlistItem};
use crate::store::{StoreFailure, bounded, is_transient_db_error, read_with_retry};

pub use memory::MemoryWatchlistStore;

/// Watchlist errors.
#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

impl StoreFailure for WatchlistError {
    fn timed_out(op: &'static str) -> Self {
        WatchlistError::Unavailable(format!("{op} timed out"))
    }

    fn is_retryable(&self) -> bool {
        match self {
            WatchlistError::Unavailable(_) => true,
            WatchlistError::DbError(e) => is_transient_db_error(e),
            _ => false,
        }
    }
}

/// Persistence for watchlist entries.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Add `symbol` as `pending`. Re-adding a symbol already on the list
    /// returns the existing entry unchanged.
    async fn add(&self, user_id: &str, symbol: &str) -> Result<WatchlistItem, WatchlistError>;

    /// All entries of a user, oldest first.
    async fn list(&self, user_id: &str) -> Result<Vec<WatchlistItem>, WatchlistError>;

    /// `None` when no entry `item_id` belongs to the user.
    async fn set_status(
        &self,
        user_id: &str,
        item_id: &str,
        status: WatchStatus,
    ) -> Result<Option<WatchlistItem>, WatchlistError>;

    /// Drop a user's whole list, returning how many entries went.
    async fn remove_all(&self, user_id: &str) -> Result<u64, WatchlistError>;
}

/// Watchlist operations over a store and a market-data provider.
#[derive(Clone)]
pub struct Watchlists {
    store: Arc<dyn WatchlistStore>,
    market: Arc<dyn MarketData>,
    store_timeout: Duration,
    read_retries: u32,
}

impl std::fmt::Debug for Watchlists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchlists")
            .field("store_timeout", &self.store_timeout)
            .field("read_retries", &self.read_retries)
            .finish_non_exhaustive()
    }
}

impl Watchlists {
    pub fn new(
        store: Arc<dyn WatchlistStore>,
        market: Arc<dyn MarketData>,
        store_timeout: Duration,
        read_retries: u32,
    ) -> Self {
        Self {
            store,
            market,
            store_timeout,
            read_retries,
        }
    }

    /// Verify `symbol` with the provider and add it. Returns the full list.
    pub async fn add(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Vec<WatchlistItem>, WatchlistError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(WatchlistError::ValidationError("Symbol is required".into()));
        }

        match self.market.symbol_search(&symbol).await {
            Ok(hits) if hits.is_empty() => {
                return Err(WatchlistError::ValidationError(
                    "Invalid symbol. Please enter a valid stock symbol.".into(),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%symbol, error = %e, "symbol verification failed");
                return Err(WatchlistError::ValidationError(
                    "Error verifying symbol. Please try again.".into(),
                ));
            }
        }

        let item = self
            .write("add_watchlist_item", self.store.add(user_id, &symbol))
            .await?;
        info!(%user_id, symbol = %item.symbol, "symbol added to watchlist");
        self.list(user_id).await
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<WatchlistItem>, WatchlistError> {
        read_with_retry(
            "list_watchlist",
            self.store_timeout,
            self.read_retries,
            || self.store.list(user_id),
        )
        .await
    }

    /// Moderate an entry. Only `accepted` and `rejected` may be set.
    pub async fn set_status(
        &self,
        user_id: &str,
        item_id: &str,
        status: &str,
    ) -> Result<WatchlistItem, WatchlistError> {
        if item_id.is_empty() || status.is_empty() {
            return Err(WatchlistError::ValidationError(
                "Symbol ID and status are required".into(),
            ));
        }
        let status = match WatchStatus::parse(status) {
            Some(s @ (WatchStatus::Accepted | WatchStatus::Rejected)) => s,
            _ => {
                return Err(WatchlistError::ValidationError(
                    "Invalid status. Status must be 'accepted' or 'rejected'".into(),
                ));
            }
        };
        self.write(
            "set_watchlist_status",
            self.store.set_status(user_id, item_id, status),
        )
        .await?
        .ok_or_else(|| WatchlistError::NotFound("Watchlist item not found".into()))
    }

    /// Quotes for every accepted symbol, fetched concurrently.
    pub async fn quotes(&self, user_id: &str) -> Result<Vec<SymbolResult<Quote>>, WatchlistError> {
        let symbols = self.accepted_symbols(user_id).await?;
        Ok(fan_out(&symbols, "Failed to fetch quote", |s| {
            let market = self.market.clone();
            async move { market.quote(&s).await }
        })
        .await)
    }

    /// Earnings history for every accepted symbol, fetched concurrently.
    pub async fn earnings(
        &self,
        user_id: &str,
    ) -> Result<Vec<SymbolResult<Vec<Earnings>>>, WatchlistError> {
        let symbols = self.accepted_symbols(user_id).await?;
        Ok(fan_out(&symbols, "Failed to fetch earnings", |s| {
            let market = self.market.clone();
            async move { market.earnings(&s).await }
        })
        .await)
    }

    pub async fn remove_all(&self, user_id: &str) -> Result<u64, WatchlistError> {
        self.write("remove_watchlist", self.store.remove_all(user_id))
            .await
    }

    async fn accepted_symbols(&self, user_id: &str) -> Result<Vec<String>, WatchlistError> {
        Ok(self
            .list(user_id)
            .await?
            .into_iter()
            .filter(|item| item.status == WatchStatus::Accepted)
            .map(|item| item.symbol)
            .collect())
    }

    async fn write<T, F>(&self, op: &'static str, fut: F) -> Result<T, WatchlistError>
    where
        F: std::future::Future<Output = Result<T, WatchlistError>>,
    {
        bounded(op, self.store_timeout, fut).await
    }
}
