/// In-app notifications
///
/// Every query here is keyed by the recipient: a user only ever reads or
/// changes their own notifications. `is_read` only moves from false to true.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::PageParams;

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, title, message, notification_type, is_read, created_at";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
}

impl Notification {
    /// Creates a notification
    ///
    /// # Errors
    ///
    /// Returns a foreign key violation if the recipient doesn't exist
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (recipient_id, title, message, notification_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(data.recipient_id)
        .bind(data.title)
        .bind(data.message)
        .bind(data.notification_type)
        .fetch_one(pool)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1 AND recipient_id = $2"
        ))
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(pool)
        .await
    }

    fn push_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        recipient_id: Uuid,
        filter: &NotificationFilter,
    ) {
        qb.push(" WHERE recipient_id = ").push_bind(recipient_id);
        if let Some(is_read) = filter.is_read {
            qb.push(" AND is_read = ").push_bind(is_read);
        }
    }

    /// Lists the recipient's notifications, newest first
    pub async fn list(
        pool: &PgPool,
        recipient_id: Uuid,
        filter: &NotificationFilter,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        Self::push_filters(&mut count, recipient_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications"
        ));
        Self::push_filters(&mut qb, recipient_id, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let notifications = qb.build_query_as::<Notification>().fetch_all(pool).await?;

        Ok((notifications, total))
    }

    /// Marks one notification read; a no-op if it already is
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(pool)
        .await
    }

    /// Marks the recipient's unread notifications read, optionally only
    /// those in `ids`
    ///
    /// Returns the number of notifications that changed.
    pub async fn mark_all_read(
        pool: &PgPool,
        recipient_id: Uuid,
        ids: Option<&[Uuid]>,
    ) -> Result<u64, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "UPDATE notifications SET is_read = TRUE WHERE is_read = FALSE AND recipient_id = ",
        );
        qb.push_bind(recipient_id);
        if let Some(ids) = ids {
            qb.push(" AND id = ANY(").push_bind(ids.to_vec()).push(")");
        }

        let result = qb.build().execute(pool).await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_count(pool: &PgPool, recipient_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, recipient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_defaults_to_info() {
        assert_eq!(NotificationType::default(), NotificationType::Info);
    }

    #[test]
    fn test_type_serde_names() {
        let parsed: NotificationType = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, NotificationType::Warning);
        assert_eq!(serde_json::to_string(&NotificationType::Success).unwrap(), "\"success\"");
    }
}
