use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use super::repo_types::{Comment, Like};
use crate::accounts::dto::UserSummary;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: String,
}

/// Body of `PUT`/`PATCH /posts/<id>/`. `PUT` requires both fields.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters."))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: Option<String>,
}

/// Body of `POST /posts/<id>/add_comment/`.
#[derive(Debug, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: String,
}

/// Body of `POST /comments/`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub post: Option<Uuid>,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLikeRequest {
    pub post: Option<Uuid>,
}

/// `GET /posts/` query string.
#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    pub search: Option<String>,
    pub author: Option<Uuid>,
    pub ordering: Option<String>,
}

/// `GET /comments/` query string; `post_id` and `post` are synonyms.
#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    pub post_id: Option<Uuid>,
    pub post: Option<Uuid>,
    pub author: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LikeQuery {
    pub post: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post: Uuid,
    pub author: Uuid,
    pub author_details: Option<UserSummary>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CommentResponse {
    pub fn new(c: Comment, author_details: Option<UserSummary>) -> Self {
        Self {
            id: c.id,
            post: c.post_id,
            author: c.author_id,
            author_details,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: Uuid,
    pub author_details: Option<UserSummary>,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub comments_count: i64,
    pub likes_count: i64,
    /// Only on the detail view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentResponse>>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub id: Uuid,
    pub user: Uuid,
    pub post: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Like> for LikeResponse {
    fn from(l: Like) -> Self {
        Self {
            id: l.id,
            user: l.user_id,
            post: l.post_id,
            created_at: l.created_at,
        }
    }
}

/// Result of the `like`/`unlike` actions.
#[derive(Debug, Serialize)]
pub struct LikeToggleResponse {
    pub message: String,
    pub likes_count: i64,
}
