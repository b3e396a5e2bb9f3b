//! In-process watchlist store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{WatchlistError, WatchlistStore};
use crate::models::watchlist::{WatchStatus, WatchlistItem};
use crate::uuid::uuidv7;

/// Volatile watchlist store keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryWatchlistStore {
    lists: DashMap<String, Vec<WatchlistItem>>,
}

impl MemoryWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchlistStore for MemoryWatchlistStore {
    async fn add(&self, user_id: &str, symbol: &str) -> Result<WatchlistItem, WatchlistError> {
        let mut list = self.lists.entry(user_id.to_string()).or_default();
        if let Some(existing) = list.iter().find(|i| i.symbol == symbol) {
            return Ok(existing.clone());
        }
        let item = WatchlistItem {
            id: uuidv7().to_string(),
            symbol: symbol.to_string(),
            status: WatchStatus::Pending,
            added_at: Utc::now(),
        };
        list.push(item.clone());
        Ok(item)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WatchlistItem>, WatchlistError> {
        Ok(self
            .lists
            .get(user_id)
            .map(|l| l.value().clone())
            .unwrap_or_default())
    }

    async fn set_status(
        &self,
        user_id: &str,
        item_id: &str,
        status: WatchStatus,
    ) -> Result<Option<WatchlistItem>, WatchlistError> {
        let Some(mut list) = self.lists.get_mut(user_id) else {
            return Ok(None);
        };
        Ok(list.iter_mut().find(|i| i.id == item_id).map(|item| {
            item.status = status;
            item.clone()
        }))
    }

    async fn remove_all(&self, user_id: &str) -> Result<u64, WatchlistError> {
        Ok(self
            .lists
            .remove(user_id)
            .map(|(_, list)| list.len() as u64)
            .unwrap_or(0))
    }
}
