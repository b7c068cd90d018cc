use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{FollowCounts, NewUser, ProfileChanges, User};
use crate::store::PgStore;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, bio, profile_picture, is_staff, created_at";

#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Inserts the user unless the username is taken; `None` means taken.
    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>>;
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// Case-insensitive; `handles` must already be lowercase.
    async fn find_users_by_handles(&self, handles: &[String]) -> anyhow::Result<Vec<User>>;
    async fn list_users(&self, exclude: Uuid, limit: i64, offset: i64)
        -> anyhow::Result<Vec<User>>;
    async fn count_users(&self, exclude: Uuid) -> anyhow::Result<i64>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges)
        -> anyhow::Result<Option<User>>;

    /// Returns `false` when the edge already existed.
    async fn insert_follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool>;
    /// Returns `false` when there was no edge to remove.
    async fn delete_follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool>;
    async fn is_following(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool>;
    async fn follow_counts(&self, user: Uuid) -> anyhow::Result<FollowCounts>;
    async fn following_ids(&self, user: Uuid) -> anyhow::Result<Vec<Uuid>>;
    async fn list_following(&self, user: Uuid, limit: i64, offset: i64)
        -> anyhow::Result<Vec<User>>;
    async fn list_followers(&self, user: Uuid, limit: i64, offset: i64)
        -> anyhow::Result<Vec<User>>;
}

#[async_trait]
impl AccountRepo for PgStore {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, bio)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.bio)
        .fetch_optional(&self.pool)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn find_users_by_handles(&self, handles: &[String]) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = ANY($1)"
        ))
        .bind(handles)
        .fetch_all(&self.pool)
        .await
        .context("find users by handles")?;
        Ok(users)
    }

    async fn list_users(
        &self,
        exclude: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE id <> $1
             ORDER BY username ASC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(exclude)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list users")?;
        Ok(rows)
    }

    async fn count_users(&self, exclude: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id <> $1")
            .bind(exclude)
            .fetch_one(&self.pool)
            .await
            .context("count users")?;
        Ok(count)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let set_picture = changes.profile_picture.is_some();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   bio = COALESCE($3, bio),
                   profile_picture = CASE WHEN $4 THEN $5 ELSE profile_picture END
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.bio)
        .bind(set_picture)
        .bind(changes.profile_picture.flatten())
        .fetch_optional(&self.pool)
        .await
        .context("update profile")?;
        Ok(user)
    }

    async fn insert_follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followed_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followed_id) DO NOTHING
            "#,
        )
        .bind(follower)
        .bind(followed)
        .execute(&self.pool)
        .await
        .context("insert follow")?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn delete_follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM follows
             WHERE follower_id = $1 AND followed_id = $2
            "#,
        )
        .bind(follower)
        .bind(followed)
        .execute(&self.pool)
        .await
        .context("delete follow")?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn is_following(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM follows
                 WHERE follower_id = $1 AND followed_id = $2
            )
            "#,
        )
        .bind(follower)
        .bind(followed)
        .fetch_one(&self.pool)
        .await
        .context("check follow edge")?;
        Ok(exists)
    }

    async fn follow_counts(&self, user: Uuid) -> anyhow::Result<FollowCounts> {
        let (followers_count, following_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE followed_id = $1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1)
            "#,
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await
        .context("follow counts")?;
        Ok(FollowCounts {
            followers_count,
            following_count,
        })
    }

    async fn following_ids(&self, user: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT followed_id FROM follows WHERE follower_id = $1")
                .bind(user)
                .fetch_all(&self.pool)
                .await
                .context("list followed ids")?;
        Ok(ids)
    }

    async fn list_following(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.bio,
                   u.profile_picture, u.is_staff, u.created_at
              FROM follows f
              JOIN users u ON u.id = f.followed_id
             WHERE f.follower_id = $1
             ORDER BY f.created_at DESC, u.id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list following")?;
        Ok(rows)
    }

    async fn list_followers(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.bio,
                   u.profile_picture, u.is_staff, u.created_at
              FROM follows f
              JOIN users u ON u.id = f.follower_id
             WHERE f.followed_id = $1
             ORDER BY f.created_at DESC, u.id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list followers")?;
        Ok(rows)
    }
}
