/// Login history
///
/// One row is written for every successful token issuance.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::pagination::PageParams;

/// A successful login
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoginHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Username at query time
    pub username: String,
    pub login_time: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

impl LoginHistory {
    /// Records a login
    pub async fn record(
        pool: &PgPool,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO login_history (user_id, ip_address, user_agent)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Lists logins, newest first, optionally for a single user
    pub async fn list(
        pool: &PgPool,
        user_id: Option<Uuid>,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM login_history WHERE ($1::uuid IS NULL OR user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let entries = sqlx::query_as::<_, LoginHistory>(
            r#"
            SELECT h.id, h.user_id, u.username, h.login_time, h.ip_address, h.user_agent
            FROM login_history h
            JOIN users u ON u.id = h.user_id
            WHERE ($1::uuid IS NULL OR h.user_id = $1)
            ORDER BY h.login_time DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((entries, total))
    }
}
