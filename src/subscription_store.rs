use crate::domain::{Subscription, UserId};
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Backend(String),
}

/// Durable per-user subscription records.
///
/// Every write is keyed by `user_id` so concurrent polls never touch
/// another user's row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscriptions with `watching = true`.
    async fn list_watched(&self) -> Result<Vec<Subscription>, StoreError>;

    async fn update_build(
        &self,
        user_id: UserId,
        prev_build: Option<i64>,
        curr_build: i64,
    ) -> Result<(), StoreError>;

    async fn set_watching(&self, user_id: UserId, watching: bool) -> Result<(), StoreError>;

    async fn find(&self, user_id: UserId) -> Result<Option<Subscription>, StoreError>;

    /// Registers a subscription, replacing any previous one for the user.
    /// Build numbers are reset and watching is re-enabled.
    async fn upsert(
        &self,
        user_id: UserId,
        source_url: &str,
        status_url: &str,
    ) -> Result<(), StoreError>;

    /// Returns whether a subscription was removed.
    async fn delete(&self, user_id: UserId) -> Result<bool, StoreError>;
}

#[derive(sqlx::FromRow)]
struct SubscriptionRecord {
    user_id: i64,
    source_url: String,
    status_url: String,
    watching: bool,
    prev_build: Option<i64>,
    curr_build: Option<i64>,
}

impl From<SubscriptionRecord> for Subscription {
    fn from(r: SubscriptionRecord) -> Self {
        Subscription {
            user_id: UserId::new(r.user_id),
            source_url: r.source_url,
            status_url: r.status_url,
            watching: r.watching,
            prev_build: r.prev_build,
            curr_build: r.curr_build,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn list_watched(&self) -> Result<Vec<Subscription>, StoreError> {
        let records = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT user_id, source_url, status_url, watching, prev_build, curr_build
            FROM subscriptions
            WHERE watching = true
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Subscription::from).collect())
    }

    async fn update_build(
        &self,
        user_id: UserId,
        prev_build: Option<i64>,
        curr_build: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET prev_build = $2,
                curr_build = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .bind(prev_build)
        .bind(curr_build)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_watching(&self, user_id: UserId, watching: bool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET watching = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .bind(watching)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<Subscription>, StoreError> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT user_id, source_url, status_url, watching, prev_build, curr_build
            FROM subscriptions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Subscription::from))
    }

    async fn upsert(
        &self,
        user_id: UserId,
        source_url: &str,
        status_url: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, source_url, status_url, watching)
            VALUES ($1, $2, $3, true)
            ON CONFLICT (user_id) DO UPDATE
            SET source_url = EXCLUDED.source_url,
                status_url = EXCLUDED.status_url,
                watching = true,
                prev_build = NULL,
                curr_build = NULL,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id.as_i64())
        .bind(source_url)
        .bind(status_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1")
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
