use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Watched-address record. The counters and filters belong to the external
/// watcher; this API only stores them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub account: String,
    pub block_height: i64,
    pub starting_block_height: i64,
    pub total_received: i64,
    pub total_spent: i64,
    pub filters: String,
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str = "id, user_id, currency, account, block_height, starting_block_height, \
                       total_received, total_spent, filters, created_at";

impl Subscription {
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {COLUMNS} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_user_currency(
        db: &PgPool,
        user_id: Uuid,
        currency: &str,
    ) -> anyhow::Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND currency = $2 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(currency)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Insert a new subscription. Returns the raw sqlx error so the caller can
    /// map a violation of the (user_id, currency, account) unique index to
    /// `Conflict` — the index is what decides concurrent duplicate subscribes.
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        currency: &str,
        account: &str,
        block_height: i64,
        starting_block_height: i64,
    ) -> Result<Subscription, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO subscriptions \
                 (user_id, currency, account, block_height, starting_block_height) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        ))
        .bind(user_id)
        .bind(currency)
        .bind(account)
        .bind(block_height)
        .bind(starting_block_height)
        .fetch_one(db)
        .await
    }

    /// Delete the row matching the triple under the given owner. The owner id
    /// is part of the WHERE clause, so a caller can never reach another
    /// owner's row. Returns the deleted id, or None when nothing matched.
    pub async fn delete_for_owner(
        db: &PgPool,
        user_id: Uuid,
        currency: &str,
        account: &str,
    ) -> anyhow::Result<Option<Uuid>> {
        let deleted: Option<(Uuid,)> = sqlx::query_as(
            "DELETE FROM subscriptions \
             WHERE user_id = $1 AND currency = $2 AND account = $3 \
             RETURNING id",
        )
        .bind(user_id)
        .bind(currency)
        .bind(account)
        .fetch_optional(db)
        .await?;
        Ok(deleted.map(|(id,)| id))
    }
}
