use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{
    Comment, CommentFilter, Like, LikeFilter, Post, PostChanges, PostFilter,
};
use crate::store::PgStore;

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn create_post(&self, author: Uuid, title: &str, content: &str) -> anyhow::Result<Post>;
    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;
    async fn list_posts(&self, filter: &PostFilter, limit: i64, offset: i64)
        -> anyhow::Result<Vec<Post>>;
    async fn count_posts(&self, filter: &PostFilter) -> anyhow::Result<i64>;
    async fn update_post(&self, id: Uuid, changes: PostChanges) -> anyhow::Result<Option<Post>>;
    /// Cascades to the post's comments and likes.
    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Newest first.
    async fn posts_by_authors(&self, authors: &[Uuid], limit: i64, offset: i64)
        -> anyhow::Result<Vec<Post>>;
    async fn count_posts_by_authors(&self, authors: &[Uuid]) -> anyhow::Result<i64>;

    async fn create_comment(&self, post: Uuid, author: Uuid, content: &str)
        -> anyhow::Result<Comment>;
    async fn find_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;
    /// Oldest first.
    async fn list_comments(&self, filter: CommentFilter, limit: i64, offset: i64)
        -> anyhow::Result<Vec<Comment>>;
    async fn count_comments(&self, filter: CommentFilter) -> anyhow::Result<i64>;
    async fn update_comment(&self, id: Uuid, content: &str) -> anyhow::Result<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> anyhow::Result<bool>;

    /// `None` when the (user, post) pair already has a like.
    async fn insert_like(&self, user: Uuid, post: Uuid) -> anyhow::Result<Option<Like>>;
    async fn delete_like(&self, user: Uuid, post: Uuid) -> anyhow::Result<bool>;
    async fn find_like(&self, id: Uuid) -> anyhow::Result<Option<Like>>;
    /// Newest first.
    async fn list_likes(&self, filter: LikeFilter, limit: i64, offset: i64)
        -> anyhow::Result<Vec<Like>>;
    async fn count_likes(&self, filter: LikeFilter) -> anyhow::Result<i64>;
    async fn delete_like_by_id(&self, id: Uuid) -> anyhow::Result<bool>;
}

/// Escapes LIKE wildcards so user input matches literally.
fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const POST_FILTER: &str = r#"
    ($1::text IS NULL OR title ILIKE $1 OR content ILIKE $1)
    AND ($2::uuid IS NULL OR author_id = $2)
"#;

#[async_trait]
impl PostRepo for PgStore {
    async fn create_post(&self, author: Uuid, title: &str, content: &str) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (author_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING id, author_id, title, content, created_at, updated_at
            "#,
        )
        .bind(author)
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .context("insert post")?;
        Ok(post)
    }

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, title, content, created_at, updated_at
              FROM posts
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find post")?;
        Ok(post)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT id, author_id, title, content, created_at, updated_at
              FROM posts
             WHERE {POST_FILTER}
             ORDER BY {}
             LIMIT $3 OFFSET $4
            "#,
            filter.ordering.sql()
        );
        let rows = sqlx::query_as::<_, Post>(&sql)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(filter.author)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("list posts")?;
        Ok(rows)
    }

    async fn count_posts(&self, filter: &PostFilter) -> anyhow::Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM posts WHERE {POST_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(filter.author)
            .fetch_one(&self.pool)
            .await
            .context("count posts")?;
        Ok(count)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
               SET title = COALESCE($2, title),
                   content = COALESCE($3, content),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, author_id, title, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .fetch_optional(&self.pool)
        .await
        .context("update post")?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete post")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn posts_by_authors(
        &self,
        authors: &[Uuid],
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, title, content, created_at, updated_at
              FROM posts
             WHERE author_id = ANY($1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(authors)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list posts by authors")?;
        Ok(rows)
    }

    async fn count_posts_by_authors(&self, authors: &[Uuid]) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ANY($1)")
            .bind(authors)
            .fetch_one(&self.pool)
            .await
            .context("count posts by authors")?;
        Ok(count)
    }

    async fn create_comment(
        &self,
        post: Uuid,
        author: Uuid,
        content: &str,
    ) -> anyhow::Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, post_id, author_id, content, created_at, updated_at
            "#,
        )
        .bind(post)
        .bind(author)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .context("insert comment")?;
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, content, created_at, updated_at
              FROM comments
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find comment")?;
        Ok(comment)
    }

    async fn list_comments(
        &self,
        filter: CommentFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, content, created_at, updated_at
              FROM comments
             WHERE ($1::uuid IS NULL OR post_id = $1)
               AND ($2::uuid IS NULL OR author_id = $2)
             ORDER BY created_at ASC, id ASC
             LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.post)
        .bind(filter.author)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list comments")?;
        Ok(rows)
    }

    async fn count_comments(&self, filter: CommentFilter) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM comments
             WHERE ($1::uuid IS NULL OR post_id = $1)
               AND ($2::uuid IS NULL OR author_id = $2)
            "#,
        )
        .bind(filter.post)
        .bind(filter.author)
        .fetch_one(&self.pool)
        .await
        .context("count comments")?;
        Ok(count)
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> anyhow::Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comments
               SET content = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, post_id, author_id, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .context("update comment")?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete comment")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn insert_like(&self, user: Uuid, post: Uuid) -> anyhow::Result<Option<Like>> {
        let like = sqlx::query_as::<_, Like>(
            r#"
            INSERT INTO likes (user_id, post_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, post_id) DO NOTHING
            RETURNING id, user_id, post_id, created_at
            "#,
        )
        .bind(user)
        .bind(post)
        .fetch_optional(&self.pool)
        .await
        .context("insert like")?;
        Ok(like)
    }

    async fn delete_like(&self, user: Uuid, post: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user)
            .bind(post)
            .execute(&self.pool)
            .await
            .context("delete like")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn find_like(&self, id: Uuid) -> anyhow::Result<Option<Like>> {
        let like = sqlx::query_as::<_, Like>(
            "SELECT id, user_id, post_id, created_at FROM likes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find like")?;
        Ok(like)
    }

    async fn list_likes(
        &self,
        filter: LikeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Like>> {
        let rows = sqlx::query_as::<_, Like>(
            r#"
            SELECT id, user_id, post_id, created_at
              FROM likes
             WHERE ($1::uuid IS NULL OR post_id = $1)
               AND ($2::uuid IS NULL OR user_id = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.post)
        .bind(filter.user)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list likes")?;
        Ok(rows)
    }

    async fn count_likes(&self, filter: LikeFilter) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM likes
             WHERE ($1::uuid IS NULL OR post_id = $1)
               AND ($2::uuid IS NULL OR user_id = $2)
            "#,
        )
        .bind(filter.post)
        .bind(filter.user)
        .fetch_one(&self.pool)
        .await
        .context("count likes")?;
        Ok(count)
    }

    async fn delete_like_by_id(&self, id: Uuid) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete like by id")?
            .rows_affected();
        Ok(affected > 0)
    }
}
