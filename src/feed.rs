//! Reverse-chronological posts from the users the caller follows.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    accounts::repo::AccountRepo,
    auth::extractors::AuthUser,
    error::AppResult,
    pagination::{Page, PageParams, PageRequest},
    posts::{dto::PostResponse, repo::PostRepo, services::post_response},
    state::AppState,
    store::Store,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/feed/", get(feed))
}

/// An empty follow set short-circuits without touching posts.
pub async fn get_feed(
    store: &dyn Store,
    user: Uuid,
    page: PageRequest,
) -> AppResult<Page<PostResponse>> {
    let authors = store.following_ids(user).await?;
    if authors.is_empty() {
        return Ok(Page::empty(page));
    }

    let count = store.count_posts_by_authors(&authors).await?;
    let posts = store
        .posts_by_authors(&authors, page.limit(), page.offset())
        .await?;
    debug!(%user, authors = authors.len(), count, "feed assembled");

    let mut results = Vec::with_capacity(posts.len());
    for post in posts {
        results.push(post_response(store, post, false).await?);
    }
    Ok(Page::new(results, count, page))
}

#[instrument(skip(state))]
pub async fn feed(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PostResponse>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(get_feed(state.store.as_ref(), user_id, page).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::repo_types::{NewUser, User},
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

    #[tokio::test]
    async fn empty_follow_set_gives_an_empty_page() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        store.create_post(b.id, "Hello", "world").await.unwrap();

        let page = get_feed(&store, a.id, PageRequest::first(20)).await.unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn only_followed_authors_newest_first() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let c = user(&store, "c").await;
        store.insert_follow(a.id, b.id).await.unwrap();

        store.create_post(b.id, "b1", "x").await.unwrap();
        store.create_post(c.id, "c1", "x").await.unwrap();
        store.create_post(b.id, "b2", "x").await.unwrap();
        store.create_post(a.id, "own", "x").await.unwrap();

        let page = get_feed(&store, a.id, PageRequest::first(20)).await.unwrap();
        let titles: Vec<_> = page.results.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b2", "b1"]);
        assert_eq!(page.count, 2);
    }

    #[tokio::test]
    async fn feed_pages_through_results() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        store.insert_follow(a.id, b.id).await.unwrap();
        for i in 0..5 {
            store.create_post(b.id, &format!("p{i}"), "x").await.unwrap();
        }

        let second = get_feed(&store, a.id, PageRequest::new(2, 2)).await.unwrap();
        let titles: Vec<_> = second.results.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["p2", "p1"]);
        assert_eq!(second.next, Some(3));
        assert_eq!(second.previous, Some(1));
    }
}
