use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{
    dto::{
        AddCommentRequest, CommentQuery, CommentResponse, CreateCommentRequest, CreateLikeRequest,
        CreatePostRequest, LikeQuery, LikeResponse, LikeToggleResponse, PostQuery, PostResponse,
        UpdateCommentRequest, UpdatePostRequest,
    },
    repo::PostRepo,
    repo_types::{Comment, CommentFilter, Like, LikeFilter, Post, PostChanges, PostFilter, PostOrdering},
};
use crate::{
    accounts::{dto::UserSummary, repo::AccountRepo},
    error::{AppError, AppResult, FieldErrors},
    notifications::{
        repo_types::{NotificationTarget, Verb},
        services::{notify, notify_comment},
    },
    pagination::{Page, PageRequest},
    permissions::ensure_can_modify,
    store::Store,
};

const REQUIRED: &str = "This field is required.";

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn invalid_pk(id: Uuid) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}

async fn user_summary(store: &dyn Store, id: Uuid) -> AppResult<Option<UserSummary>> {
    Ok(store.find_user(id).await?.map(|u| UserSummary::from(&u)))
}

async fn existing_post(store: &dyn Store, id: Uuid) -> AppResult<Post> {
    store.find_post(id).await?.ok_or(AppError::NotFound)
}

async fn existing_comment(store: &dyn Store, id: Uuid) -> AppResult<Comment> {
    store.find_comment(id).await?.ok_or(AppError::NotFound)
}

/// Resolves the `post` field of a create body into an existing post.
async fn referenced_post(store: &dyn Store, post: Option<Uuid>) -> AppResult<Post> {
    let Some(id) = post else {
        return Err(AppError::Validation(FieldErrors::single("post", REQUIRED)));
    };
    store
        .find_post(id)
        .await?
        .ok_or_else(|| AppError::Validation(FieldErrors::single("post", invalid_pk(id))))
}

async fn comment_response(store: &dyn Store, comment: Comment) -> AppResult<CommentResponse> {
    let author = user_summary(store, comment.author_id).await?;
    Ok(CommentResponse::new(comment, author))
}

pub(crate) async fn post_response(
    store: &dyn Store,
    post: Post,
    with_comments: bool,
) -> AppResult<PostResponse> {
    let by_post = CommentFilter {
        post: Some(post.id),
        author: None,
    };
    let comments_count = store.count_comments(by_post).await?;
    let likes_count = store
        .count_likes(LikeFilter {
            post: Some(post.id),
            user: None,
        })
        .await?;

    let comments = if with_comments {
        let mut out = Vec::new();
        for c in store.list_comments(by_post, comments_count, 0).await? {
            out.push(comment_response(store, c).await?);
        }
        Some(out)
    } else {
        None
    };

    Ok(PostResponse {
        id: post.id,
        author: post.author_id,
        author_details: user_summary(store, post.author_id).await?,
        title: post.title,
        content: post.content,
        created_at: post.created_at,
        updated_at: post.updated_at,
        comments_count,
        likes_count,
        comments,
    })
}

async fn likes_on(store: &dyn Store, post: Uuid) -> AppResult<i64> {
    Ok(store
        .count_likes(LikeFilter {
            post: Some(post),
            user: None,
        })
        .await?)
}

// --- posts ---

pub async fn list_posts(
    store: &dyn Store,
    query: PostQuery,
    page: PageRequest,
) -> AppResult<Page<PostResponse>> {
    let ordering = match query.ordering.as_deref() {
        None | Some("") => PostOrdering::default(),
        Some(raw) => PostOrdering::parse(raw).ok_or_else(|| {
            AppError::Validation(FieldErrors::single(
                "ordering",
                format!("Unsupported ordering \"{raw}\"."),
            ))
        })?,
    };
    let filter = PostFilter {
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        author: query.author,
        ordering,
    };

    let count = store.count_posts(&filter).await?;
    let posts = store.list_posts(&filter, page.limit(), page.offset()).await?;
    let mut results = Vec::with_capacity(posts.len());
    for post in posts {
        results.push(post_response(store, post, false).await?);
    }
    Ok(Page::new(results, count, page))
}

pub async fn create_post(
    store: &dyn Store,
    author: Uuid,
    mut req: CreatePostRequest,
) -> AppResult<PostResponse> {
    trim_in_place(&mut req.title);
    trim_in_place(&mut req.content);
    req.validate()?;

    let post = store.create_post(author, &req.title, &req.content).await?;
    info!(post_id = %post.id, %author, "post created");
    post_response(store, post, false).await
}

pub async fn get_post(store: &dyn Store, id: Uuid) -> AppResult<PostResponse> {
    let post = existing_post(store, id).await?;
    post_response(store, post, true).await
}

/// `partial` is PATCH; otherwise every field must be present.
pub async fn update_post(
    store: &dyn Store,
    actor: Uuid,
    id: Uuid,
    req: UpdatePostRequest,
    partial: bool,
) -> AppResult<PostResponse> {
    let post = existing_post(store, id).await?;
    ensure_can_modify(store, actor, post.author_id).await?;

    let req = UpdatePostRequest {
        title: trim_opt(req.title),
        content: trim_opt(req.content),
    };
    let mut errors = FieldErrors::new();
    if let Err(e) = req.validate() {
        errors.extend_from(&e);
    }
    if !partial {
        if req.title.is_none() {
            errors.add("title", REQUIRED);
        }
        if req.content.is_none() {
            errors.add("content", REQUIRED);
        }
    }
    errors.into_result()?;

    let changes = PostChanges {
        title: req.title,
        content: req.content,
    };
    let post = store
        .update_post(id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(post_id = %post.id, %actor, "post updated");
    post_response(store, post, true).await
}

pub async fn delete_post(store: &dyn Store, actor: Uuid, id: Uuid) -> AppResult<()> {
    let post = existing_post(store, id).await?;
    ensure_can_modify(store, actor, post.author_id).await?;
    if !store.delete_post(id).await? {
        return Err(AppError::NotFound);
    }
    info!(post_id = %id, %actor, "post deleted");
    Ok(())
}

// --- likes ---

/// Inserts the like and notifies the author. The unique (user, post) pair
/// in the store decides whether this is a duplicate.
async fn record_like(store: &dyn Store, user: Uuid, post: &Post) -> AppResult<Like> {
    let Some(like) = store.insert_like(user, post.id).await? else {
        return Err(AppError::AlreadyLiked);
    };
    info!(post_id = %post.id, %user, "post liked");
    notify(
        store,
        post.author_id,
        user,
        Verb::Like,
        Some(NotificationTarget::Post(post.id)),
    )
    .await;
    Ok(like)
}

pub async fn like_post(store: &dyn Store, user: Uuid, post_id: Uuid) -> AppResult<LikeToggleResponse> {
    let post = existing_post(store, post_id).await?;
    record_like(store, user, &post).await?;
    Ok(LikeToggleResponse {
        message: "Post liked successfully.".into(),
        likes_count: likes_on(store, post.id).await?,
    })
}

pub async fn unlike_post(
    store: &dyn Store,
    user: Uuid,
    post_id: Uuid,
) -> AppResult<LikeToggleResponse> {
    let post = existing_post(store, post_id).await?;
    if !store.delete_like(user, post.id).await? {
        return Err(AppError::NotLiked);
    }
    info!(post_id = %post.id, %user, "post unliked");
    Ok(LikeToggleResponse {
        message: "Post unliked successfully.".into(),
        likes_count: likes_on(store, post.id).await?,
    })
}

pub async fn list_likes(
    store: &dyn Store,
    query: LikeQuery,
    page: PageRequest,
) -> AppResult<Page<LikeResponse>> {
    let filter = LikeFilter {
        post: query.post,
        user: query.user,
    };
    let count = store.count_likes(filter).await?;
    let likes = store.list_likes(filter, page.limit(), page.offset()).await?;
    Ok(Page::new(likes, count, page).map(LikeResponse::from))
}

pub async fn create_like(
    store: &dyn Store,
    user: Uuid,
    req: CreateLikeRequest,
) -> AppResult<LikeResponse> {
    let post = referenced_post(store, req.post).await?;
    Ok(record_like(store, user, &post).await?.into())
}

pub async fn get_like(store: &dyn Store, id: Uuid) -> AppResult<LikeResponse> {
    let like = store.find_like(id).await?.ok_or(AppError::NotFound)?;
    Ok(like.into())
}

pub async fn delete_like(store: &dyn Store, actor: Uuid, id: Uuid) -> AppResult<()> {
    let like = store.find_like(id).await?.ok_or(AppError::NotFound)?;
    ensure_can_modify(store, actor, like.user_id).await?;
    if !store.delete_like_by_id(id).await? {
        return Err(AppError::NotFound);
    }
    info!(like_id = %id, %actor, "like deleted");
    Ok(())
}

// --- comments ---

async fn insert_comment(
    store: &dyn Store,
    author: Uuid,
    post: &Post,
    content: &str,
) -> AppResult<CommentResponse> {
    let comment = store.create_comment(post.id, author, content).await?;
    info!(comment_id = %comment.id, post_id = %post.id, %author, "comment created");
    notify_comment(store, post.author_id, &comment).await;
    comment_response(store, comment).await
}

pub async fn add_comment(
    store: &dyn Store,
    author: Uuid,
    post_id: Uuid,
    mut req: AddCommentRequest,
) -> AppResult<CommentResponse> {
    let post = existing_post(store, post_id).await?;
    trim_in_place(&mut req.content);
    req.validate()?;
    insert_comment(store, author, &post, &req.content).await
}

pub async fn create_comment(
    store: &dyn Store,
    author: Uuid,
    mut req: CreateCommentRequest,
) -> AppResult<CommentResponse> {
    trim_in_place(&mut req.content);
    let mut errors = FieldErrors::new();
    if let Err(e) = req.validate() {
        errors.extend_from(&e);
    }
    let post = match req.post {
        None => {
            errors.add("post", REQUIRED);
            None
        }
        Some(id) => match store.find_post(id).await? {
            Some(post) => Some(post),
            None => {
                errors.add("post", invalid_pk(id));
                None
            }
        },
    };
    errors.into_result()?;
    let post = post.ok_or(AppError::NotFound)?;
    insert_comment(store, author, &post, &req.content).await
}

pub async fn list_comments(
    store: &dyn Store,
    query: CommentQuery,
    page: PageRequest,
) -> AppResult<Page<CommentResponse>> {
    let filter = CommentFilter {
        post: query.post_id.or(query.post),
        author: query.author,
    };
    let count = store.count_comments(filter).await?;
    let comments = store
        .list_comments(filter, page.limit(), page.offset())
        .await?;
    let mut results = Vec::with_capacity(comments.len());
    for c in comments {
        results.push(comment_response(store, c).await?);
    }
    Ok(Page::new(results, count, page))
}

pub async fn get_comment(store: &dyn Store, id: Uuid) -> AppResult<CommentResponse> {
    let comment = existing_comment(store, id).await?;
    comment_response(store, comment).await
}

pub async fn update_comment(
    store: &dyn Store,
    actor: Uuid,
    id: Uuid,
    req: UpdateCommentRequest,
    partial: bool,
) -> AppResult<CommentResponse> {
    let comment = existing_comment(store, id).await?;
    ensure_can_modify(store, actor, comment.author_id).await?;

    let req = UpdateCommentRequest {
        content: trim_opt(req.content),
    };
    req.validate()?;
    let Some(content) = req.content else {
        if partial {
            return comment_response(store, comment).await;
        }
        return Err(AppError::Validation(FieldErrors::single("content", REQUIRED)));
    };

    let comment = store
        .update_comment(id, &content)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(comment_id = %comment.id, %actor, "comment updated");
    comment_response(store, comment).await
}

pub async fn delete_comment(store: &dyn Store, actor: Uuid, id: Uuid) -> AppResult<()> {
    let comment = existing_comment(store, id).await?;
    ensure_can_modify(store, actor, comment.author_id).await?;
    if !store.delete_comment(id).await? {
        return Err(AppError::NotFound);
    }
    info!(comment_id = %id, %actor, "comment deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::repo_types::{NewUser, User},
        notifications::repo::NotificationRepo,
        store::MemoryStore,
    };

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                bio: String::new(),
            })
            .await
            .unwrap()
            .unwrap()
    }

    fn new_post(title: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            content: "body".into(),
        }
    }

    #[tokio::test]
    async fn like_twice_fails_and_unlike_without_like_fails() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let post = create_post(&store, author.id, new_post("Hello")).await.unwrap();

        let liked = like_post(&store, fan.id, post.id).await.unwrap();
        assert_eq!(liked.likes_count, 1);
        assert!(matches!(
            like_post(&store, fan.id, post.id).await,
            Err(AppError::AlreadyLiked)
        ));

        let unliked = unlike_post(&store, fan.id, post.id).await.unwrap();
        assert_eq!(unliked.likes_count, 0);
        assert!(matches!(
            unlike_post(&store, fan.id, post.id).await,
            Err(AppError::NotLiked)
        ));
        assert!(matches!(
            like_post(&store, fan.id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn likes_notify_the_author_but_not_self_likes() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let post = create_post(&store, author.id, new_post("Hello")).await.unwrap();

        like_post(&store, author.id, post.id).await.unwrap();
        assert_eq!(store.count_notifications(author.id, None).await.unwrap(), 0);

        like_post(&store, fan.id, post.id).await.unwrap();
        let got = store.list_notifications(author.id, None, 10, 0).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].verb, Verb::Like);
        assert_eq!(got[0].target, Some(NotificationTarget::Post(post.id)));
    }

    #[tokio::test]
    async fn non_owner_cannot_modify_but_can_read() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let other = user(&store, "other").await;
        let post = create_post(&store, owner.id, new_post("Mine")).await.unwrap();

        let patch = UpdatePostRequest {
            title: Some("Stolen".into()),
            content: None,
        };
        assert!(matches!(
            update_post(&store, other.id, post.id, patch, true).await,
            Err(AppError::PermissionDenied)
        ));
        assert!(matches!(
            delete_post(&store, other.id, post.id).await,
            Err(AppError::PermissionDenied)
        ));
        assert_eq!(get_post(&store, post.id).await.unwrap().title, "Mine");

        store.set_staff(other.id, true).await;
        delete_post(&store, other.id, post.id).await.unwrap();
        assert!(matches!(get_post(&store, post.id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn put_requires_every_field_and_patch_does_not() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let post = create_post(&store, owner.id, new_post("Draft")).await.unwrap();

        let err = update_post(
            &store,
            owner.id,
            post.id,
            UpdatePostRequest {
                title: Some("Final".into()),
                content: None,
            },
            false,
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(fields) => assert!(fields.0.contains_key("content")),
            other => panic!("unexpected error {other:?}"),
        }

        let updated = update_post(
            &store,
            owner.id,
            post.id,
            UpdatePostRequest {
                title: Some("  Final ".into()),
                content: None,
            },
            true,
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.content, "body");
        assert!(updated.updated_at > updated.created_at);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let err = create_post(
            &store,
            owner.id,
            CreatePostRequest {
                title: "   ".into(),
                content: String::new(),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert!(fields.0.contains_key("title"));
                assert!(fields.0.contains_key("content"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn listing_filters_and_orders_posts() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        create_post(&store, a.id, new_post("Rust tips")).await.unwrap();
        create_post(&store, b.id, new_post("Cooking")).await.unwrap();
        create_post(&store, a.id, new_post("More rust")).await.unwrap();

        let page = PageRequest::first(20);
        let all = list_posts(&store, PostQuery::default(), page).await.unwrap();
        assert_eq!(all.count, 3);
        assert_eq!(all.results[0].title, "More rust");

        let rust = list_posts(
            &store,
            PostQuery {
                search: Some("RUST".into()),
                ordering: Some("created_at".into()),
                ..Default::default()
            },
            page,
        )
        .await
        .unwrap();
        let titles: Vec<_> = rust.results.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust tips", "More rust"]);

        let by_b = list_posts(
            &store,
            PostQuery {
                author: Some(b.id),
                ..Default::default()
            },
            page,
        )
        .await
        .unwrap();
        assert_eq!(by_b.count, 1);
        assert_eq!(by_b.results[0].author_details.as_ref().unwrap().username, "b");

        assert!(matches!(
            list_posts(
                &store,
                PostQuery {
                    ordering: Some("title".into()),
                    ..Default::default()
                },
                page,
            )
            .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn comments_show_up_on_the_post_detail() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let reader = user(&store, "reader").await;
        let post = create_post(&store, author.id, new_post("Hello")).await.unwrap();

        add_comment(
            &store,
            reader.id,
            post.id,
            AddCommentRequest {
                content: "first".into(),
            },
        )
        .await
        .unwrap();
        create_comment(
            &store,
            author.id,
            CreateCommentRequest {
                post: Some(post.id),
                content: "second".into(),
            },
        )
        .await
        .unwrap();

        let detail = get_post(&store, post.id).await.unwrap();
        assert_eq!(detail.comments_count, 2);
        let comments = detail.comments.unwrap();
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[1].content, "second");

        // Only the reader's comment notifies the author.
        assert_eq!(store.count_notifications(author.id, None).await.unwrap(), 1);

        let by_reader = list_comments(
            &store,
            CommentQuery {
                author: Some(reader.id),
                ..Default::default()
            },
            PageRequest::first(20),
        )
        .await
        .unwrap();
        assert_eq!(by_reader.count, 1);
    }

    #[tokio::test]
    async fn create_comment_checks_the_post_reference() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        for post in [None, Some(Uuid::new_v4())] {
            let err = create_comment(
                &store,
                a.id,
                CreateCommentRequest {
                    post,
                    content: "hi".into(),
                },
            )
            .await
            .unwrap_err();
            match err {
                AppError::Validation(fields) => assert!(fields.0.contains_key("post")),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn comment_and_like_ownership() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let other = user(&store, "other").await;
        let post = create_post(&store, author.id, new_post("Hello")).await.unwrap();

        let comment = add_comment(
            &store,
            author.id,
            post.id,
            AddCommentRequest {
                content: "mine".into(),
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            update_comment(
                &store,
                other.id,
                comment.id,
                UpdateCommentRequest {
                    content: Some("hijack".into())
                },
                true,
            )
            .await,
            Err(AppError::PermissionDenied)
        ));
        let edited = update_comment(
            &store,
            author.id,
            comment.id,
            UpdateCommentRequest {
                content: Some("edited".into()),
            },
            false,
        )
        .await
        .unwrap();
        assert_eq!(edited.content, "edited");

        let like = create_like(
            &store,
            other.id,
            CreateLikeRequest {
                post: Some(post.id),
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            create_like(
                &store,
                other.id,
                CreateLikeRequest {
                    post: Some(post.id)
                }
            )
            .await,
            Err(AppError::AlreadyLiked)
        ));
        assert!(matches!(
            delete_like(&store, author.id, like.id).await,
            Err(AppError::PermissionDenied)
        ));
        delete_like(&store, other.id, like.id).await.unwrap();
        assert!(matches!(get_like(&store, like.id).await, Err(AppError::NotFound)));

        delete_comment(&store, author.id, comment.id).await.unwrap();
        assert!(matches!(
            get_comment(&store, comment.id).await,
            Err(AppError::NotFound)
        ));
    }
}
