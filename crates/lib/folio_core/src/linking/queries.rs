//! PostgreSQL linked-item store, sharing the pool of [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{LinkError, LinkedItemStore};
use crate::auth::queries::PgStore;
use crate::models::linking::{ExchangedItem, Institution, LinkedItem};
use crate::uuid::uuidv7;

const ITEM_COLUMNS: &str = "id::text AS id, user_id::text AS user_id, access_token, item_id, \
     institution_id, institution_name, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    user_id: String,
    access_token: String,
    item_id: String,
    institution_id: String,
    institution_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for LinkedItem {
    fn from(row: ItemRow) -> Self {
        LinkedItem {
            id: row.id,
            user_id: row.user_id,
            access_token: row.access_token,
            item_id: row.item_id,
            institution_id: row.institution_id,
            institution_name: row.institution_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl LinkedItemStore for PgStore {
    async fn upsert(
        &self,
        user_id: &str,
        exchanged: &ExchangedItem,
        institution: &Institution,
    ) -> Result<LinkedItem, LinkError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "INSERT INTO plaid_items \
             (id, user_id, access_token, item_id, institution_id, institution_name) \
             VALUES ($1, $2::uuid, $3, $4, $5, $6) \
             ON CONFLICT (user_id, institution_id) DO UPDATE SET \
             access_token = EXCLUDED.access_token, item_id = EXCLUDED.item_id, \
             institution_name = EXCLUDED.institution_name, updated_at = now() \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(user_id)
        .bind(&exchanged.access_token)
        .bind(&exchanged.item_id)
        .bind(&institution.institution_id)
        .bind(&institution.name)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<LinkedItem>, LinkError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM plaid_items \
             WHERE user_id = $1::uuid ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(LinkedItem::from).collect())
    }

    async fn remove_all(&self, user_id: &str) -> Result<u64, LinkError> {
        let result = sqlx::query("DELETE FROM plaid_items WHERE user_id = $1::uuid")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
