//! PostgreSQL watchlist store, sharing the pool of [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{WatchlistError, WatchlistStore};
use crate::auth::queries::PgStore;
use crate::models::watchlist::{WatchStatus, WatchlistItem};
use crate::uuid::uuidv7;

const ITEM_COLUMNS: &str = "id::text AS id, symbol, status, added_at";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    symbol: String,
    status: String,
    added_at: DateTime<Utc>,
}

impl From<ItemRow> for WatchlistItem {
    fn from(row: ItemRow) -> Self {
        WatchlistItem {
            id: row.id,
            symbol: row.symbol,
            // The column is CHECK-constrained to the three known values.
            status: WatchStatus::parse(&row.status).unwrap_or(WatchStatus::Pending),
            added_at: row.added_at,
        }
    }
}

#[async_trait]
impl WatchlistStore for PgStore {
    async fn add(&self, user_id: &str, symbol: &str) -> Result<WatchlistItem, WatchlistError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "INSERT INTO watchlist_items (id, user_id, symbol, status) \
             VALUES ($1, $2::uuid, $3, 'pending') \
             ON CONFLICT (user_id, symbol) DO UPDATE SET symbol = EXCLUDED.symbol \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(user_id)
        .bind(symbol)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WatchlistItem>, WatchlistError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM watchlist_items \
             WHERE user_id = $1::uuid ORDER BY added_at, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(WatchlistItem::from).collect())
    }

    async fn set_status(
        &self,
        user_id: &str,
        item_id: &str,
        status: WatchStatus,
    ) -> Result<Option<WatchlistItem>, WatchlistError> {
        let Ok(item_id) = uuid::Uuid::parse_str(item_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "UPDATE watchlist_items SET status = $3 \
             WHERE id = $1 AND user_id = $2::uuid \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(WatchlistItem::from))
    }

    async fn remove_all(&self, user_id: &str) -> Result<u64, WatchlistError> {
        let result = sqlx::query("DELETE FROM watchlist_items WHERE user_id = $1::uuid")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
