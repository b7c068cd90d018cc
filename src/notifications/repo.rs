use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewNotification, Notification, NotificationRow};
use crate::store::PgStore;

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert_notification(&self, new: NewNotification) -> anyhow::Result<Notification>;
    async fn find_notification(&self, id: Uuid) -> anyhow::Result<Option<Notification>>;
    /// Newest first; `read` filters on the flag when set.
    async fn list_notifications(
        &self,
        recipient: Uuid,
        read: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Notification>>;
    async fn count_notifications(&self, recipient: Uuid, read: Option<bool>)
        -> anyhow::Result<i64>;
    async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Returns how many unread notifications were flipped.
    async fn mark_all_read(&self, recipient: Uuid) -> anyhow::Result<u64>;
}

fn into_domain(rows: Vec<NotificationRow>) -> anyhow::Result<Vec<Notification>> {
    rows.into_iter().map(Notification::try_from).collect()
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn insert_notification(&self, new: NewNotification) -> anyhow::Result<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (recipient_id, actor_id, verb, target_kind, target_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, recipient_id, actor_id, verb, read, target_kind, target_id, created_at
            "#,
        )
        .bind(new.recipient)
        .bind(new.actor)
        .bind(new.verb.as_str())
        .bind(new.target.map(|t| t.kind()))
        .bind(new.target.map(|t| t.id()))
        .fetch_one(&self.pool)
        .await
        .context("insert notification")?;
        row.try_into()
    }

    async fn find_notification(&self, id: Uuid) -> anyhow::Result<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, actor_id, verb, read, target_kind, target_id, created_at
              FROM notifications
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find notification")?;
        row.map(Notification::try_from).transpose()
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        read: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, actor_id, verb, read, target_kind, target_id, created_at
              FROM notifications
             WHERE recipient_id = $1
               AND ($2::boolean IS NULL OR read = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4
            "#,
        )
        .bind(recipient)
        .bind(read)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list notifications")?;
        into_domain(rows)
    }

    async fn count_notifications(
        &self,
        recipient: Uuid,
        read: Option<bool>,
    ) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
             WHERE recipient_id = $1
               AND ($2::boolean IS NULL OR read = $2)
            "#,
        )
        .bind(recipient)
        .bind(read)
        .fetch_one(&self.pool)
        .await
        .context("count notifications")?;
        Ok(count)
    }

    async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("mark notification read")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn mark_all_read(&self, recipient: Uuid) -> anyhow::Result<u64> {
        let affected = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient)
        .execute(&self.pool)
        .await
        .context("mark all notifications read")?
        .rows_affected();
        Ok(affected)
    }
}
