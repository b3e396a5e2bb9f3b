//! In-process linked-item store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{LinkError, LinkedItemStore};
use crate::models::linking::{ExchangedItem, Institution, LinkedItem};
use crate::uuid::uuidv7;

/// Volatile linked-item store keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryLinkedItemStore {
    items: DashMap<String, Vec<LinkedItem>>,
}

impl MemoryLinkedItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkedItemStore for MemoryLinkedItemStore {
    async fn upsert(
        &self,
        user_id: &str,
        exchanged: &ExchangedItem,
        institution: &Institution,
    ) -> Result<LinkedItem, LinkError> {
        let now = Utc::now();
        let mut items = self.items.entry(user_id.to_string()).or_default();
        if let Some(existing) = items
            .iter_mut()
            .find(|i| i.institution_id == institution.institution_id)
        {
            existing.access_token = exchanged.access_token.clone();
            existing.item_id = exchanged.item_id.clone();
            existing.institution_name = institution.name.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let item = LinkedItem {
            id: uuidv7().to_string(),
            user_id: user_id.to_string(),
            access_token: exchanged.access_token.clone(),
            item_id: exchanged.item_id.clone(),
            institution_id: institution.institution_id.clone(),
            institution_name: institution.name.clone(),
            created_at: now,
            updated_at: now,
        };
        items.push(item.clone());
        Ok(item)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<LinkedItem>, LinkError> {
        Ok(self
            .items
            .get(user_id)
            .map(|l| l.value().clone())
            .unwrap_or_default())
    }

    async fn remove_all(&self, user_id: &str) -> Result<u64, LinkError> {
        Ok(self
            .items
            .remove(user_id)
            .map(|(_, items)| items.len() as u64)
            .unwrap_or(0))
    }
}
