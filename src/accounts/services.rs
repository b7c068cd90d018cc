use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{
    dto::{FollowResponse, ProfileResponse, PublicProfile, UpdateProfileRequest, UserDetail},
    repo::AccountRepo,
    repo_types::{ProfileChanges, User},
};
use crate::{
    error::{AppError, AppResult},
    notifications::{repo_types::Verb, services::notify},
    pagination::{Page, PageRequest},
    store::Store,
};

async fn existing_user(store: &dyn Store, id: Uuid) -> AppResult<User> {
    store.find_user(id).await?.ok_or(AppError::NotFound)
}

async fn public_profiles(store: &dyn Store, users: Vec<User>) -> AppResult<Vec<PublicProfile>> {
    let mut out = Vec::with_capacity(users.len());
    for user in users {
        let counts = store.follow_counts(user.id).await?;
        out.push(PublicProfile::new(user, counts));
    }
    Ok(out)
}

pub async fn profile(store: &dyn Store, user_id: Uuid) -> AppResult<ProfileResponse> {
    // A valid token for a vanished account is treated like a bad token.
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;
    let counts = store.follow_counts(user.id).await?;
    Ok(ProfileResponse::new(user, counts))
}

pub async fn update_profile(
    store: &dyn Store,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> AppResult<ProfileResponse> {
    req.validate()?;
    let changes = ProfileChanges {
        email: req.email.map(|e| e.trim().to_lowercase()),
        bio: req.bio,
        profile_picture: req
            .profile_picture
            .map(|p| Some(p.trim().to_string()).filter(|p| !p.is_empty())),
    };
    let user = store
        .update_profile(user_id, changes)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;
    info!(%user_id, "profile updated");
    let counts = store.follow_counts(user.id).await?;
    Ok(ProfileResponse::new(user, counts))
}

/// Everyone except the caller, by username.
pub async fn list_users(
    store: &dyn Store,
    viewer: Uuid,
    page: PageRequest,
) -> AppResult<Page<PublicProfile>> {
    let count = store.count_users(viewer).await?;
    let users = store.list_users(viewer, page.limit(), page.offset()).await?;
    Ok(Page::new(public_profiles(store, users).await?, count, page))
}

pub async fn user_detail(store: &dyn Store, viewer: Uuid, id: Uuid) -> AppResult<UserDetail> {
    let user = existing_user(store, id).await?;
    let counts = store.follow_counts(user.id).await?;
    let is_following = store.is_following(viewer, user.id).await?;
    Ok(UserDetail {
        profile: PublicProfile::new(user, counts),
        is_following,
    })
}

pub async fn follow(store: &dyn Store, actor: Uuid, target_id: Uuid) -> AppResult<FollowResponse> {
    let target = existing_user(store, target_id).await?;
    if actor == target.id {
        return Err(AppError::SelfFollow);
    }
    if !store.insert_follow(actor, target.id).await? {
        return Err(AppError::AlreadyFollowing(target.username));
    }
    info!(follower = %actor, followed = %target.id, "follow created");

    notify(store, target.id, actor, Verb::Follow, None).await;

    let followers_count = store.follow_counts(target.id).await?.followers_count;
    let following_count = store.follow_counts(actor).await?.following_count;
    Ok(FollowResponse {
        message: format!("You are now following {}", target.username),
        following: true,
        followers_count,
        following_count,
    })
}

pub async fn unfollow(
    store: &dyn Store,
    actor: Uuid,
    target_id: Uuid,
) -> AppResult<FollowResponse> {
    let target = existing_user(store, target_id).await?;
    if !store.delete_follow(actor, target.id).await? {
        return Err(AppError::NotFollowing(target.username));
    }
    info!(follower = %actor, followed = %target.id, "follow removed");

    let followers_count = store.follow_counts(target.id).await?.followers_count;
    let following_count = store.follow_counts(actor).await?.following_count;
    Ok(FollowResponse {
        message: format!("You have unfollowed {}", target.username),
        following: false,
        followers_count,
        following_count,
    })
}

pub async fn list_following(
    store: &dyn Store,
    user: Uuid,
    page: PageRequest,
) -> AppResult<Page<PublicProfile>> {
    let count = store.follow_counts(user).await?.following_count;
    let users = store.list_following(user, page.limit(), page.offset()).await?;
    Ok(Page::new(public_profiles(store, users).await?, count, page))
}

pub async fn list_followers(
    store: &dyn Store,
    user: Uuid,
    page: PageRequest,
) -> AppResult<Page<PublicProfile>> {
    let count = store.follow_counts(user).await?.followers_count;
    let users = store.list_followers(user, page.limit(), page.offset()).await?;
    Ok(Page::new(public_profiles(store, users).await?, count, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::repo_types::NewUser, notifications::repo::NotificationRepo,
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
    async fn follow_then_unfollow_restores_counts() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;

        let res = follow(&store, a.id, b.id).await.unwrap();
        assert!(res.following);
        assert_eq!(res.followers_count, 1);
        assert_eq!(res.following_count, 1);
        assert_eq!(res.message, "You are now following b");

        let res = unfollow(&store, a.id, b.id).await.unwrap();
        assert!(!res.following);
        assert_eq!(res.followers_count, 0);
        assert_eq!(res.following_count, 0);

        let err = unfollow(&store, a.id, b.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFollowing(ref name) if name == "b"));
    }

    #[tokio::test]
    async fn follow_rules() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;

        assert!(matches!(
            follow(&store, a.id, a.id).await,
            Err(AppError::SelfFollow)
        ));
        assert!(matches!(
            follow(&store, a.id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));

        follow(&store, a.id, b.id).await.unwrap();
        assert!(matches!(
            follow(&store, a.id, b.id).await,
            Err(AppError::AlreadyFollowing(_))
        ));

        // Edges are directed.
        assert!(store.is_following(a.id, b.id).await.unwrap());
        assert!(!store.is_following(b.id, a.id).await.unwrap());
    }

    #[tokio::test]
    async fn follow_notifies_the_target_once() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;

        follow(&store, a.id, b.id).await.unwrap();
        let _ = follow(&store, a.id, b.id).await;
        unfollow(&store, a.id, b.id).await.unwrap();

        let got = store.list_notifications(b.id, None, 10, 0).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].verb, Verb::Follow);
        assert_eq!(got[0].actor_id, a.id);
        assert_eq!(got[0].target, None);
    }

    #[tokio::test]
    async fn detail_and_lists_reflect_the_graph() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let c = user(&store, "c").await;
        follow(&store, a.id, b.id).await.unwrap();
        follow(&store, c.id, b.id).await.unwrap();

        let detail = user_detail(&store, a.id, b.id).await.unwrap();
        assert!(detail.is_following);
        assert_eq!(detail.profile.counts.followers_count, 2);
        assert!(!user_detail(&store, b.id, a.id).await.unwrap().is_following);

        let followers = list_followers(&store, b.id, PageRequest::first(20)).await.unwrap();
        assert_eq!(followers.count, 2);
        let following = list_following(&store, a.id, PageRequest::first(20)).await.unwrap();
        assert_eq!(following.results[0].username, "b");

        let others = list_users(&store, a.id, PageRequest::first(20)).await.unwrap();
        assert_eq!(others.count, 2);
        assert!(others.results.iter().all(|p| p.id != a.id));
    }

    #[tokio::test]
    async fn profile_update_is_partial_and_validated() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;

        let updated = update_profile(
            &store,
            a.id,
            UpdateProfileRequest {
                bio: Some("hello".into()),
                profile_picture: Some("https://img.example.com/a.png".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.email, "a@example.com");

        let cleared = update_profile(
            &store,
            a.id,
            UpdateProfileRequest {
                profile_picture: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.profile_picture, None);
        assert_eq!(cleared.bio, "hello");

        let err = update_profile(
            &store,
            a.id,
            UpdateProfileRequest {
                email: Some("not-an-email".into()),
                bio: Some("x".repeat(501)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(fields) => {
                assert!(fields.0.contains_key("email"));
                assert!(fields.0.contains_key("bio"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
