use std::cmp::Reverse;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    accounts::{
        repo::AccountRepo,
        repo_types::{FollowCounts, NewUser, ProfileChanges, User},
    },
    notifications::{
        repo::NotificationRepo,
        repo_types::{NewNotification, Notification},
    },
    posts::{
        repo::PostRepo,
        repo_types::{Comment, CommentFilter, Like, LikeFilter, Post, PostChanges, PostFilter,
                     PostOrdering},
    },
};

struct FollowEdge {
    follower: Uuid,
    followed: Uuid,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    follows: Vec<FollowEdge>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    likes: Vec<Like>,
    notifications: Vec<Notification>,
    last_tick: Option<OffsetDateTime>,
}

impl Tables {
    /// Strictly increasing timestamps at the microsecond precision Postgres keeps.
    fn now(&mut self) -> OffsetDateTime {
        let mut now = OffsetDateTime::now_utc();
        if let Some(last) = self.last_tick {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_tick = Some(now);
        now
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn users_by_ids(&self, ids: impl Iterator<Item = Uuid>) -> Vec<User> {
        ids.filter_map(|id| self.user(id).cloned()).collect()
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

fn post_matches(post: &Post, filter: &PostFilter) -> bool {
    let search_ok = filter.search.as_ref().map_or(true, |needle| {
        let needle = needle.to_lowercase();
        post.title.to_lowercase().contains(&needle) || post.content.to_lowercase().contains(&needle)
    });
    let author_ok = filter.author.map_or(true, |a| post.author_id == a);
    search_ok && author_ok
}

fn sort_posts(posts: &mut [Post], ordering: PostOrdering) {
    match ordering {
        PostOrdering::CreatedAsc => posts.sort_by_key(|p| (p.created_at, p.id)),
        PostOrdering::CreatedDesc => posts.sort_by_key(|p| Reverse((p.created_at, p.id))),
        PostOrdering::UpdatedAsc => posts.sort_by_key(|p| (p.updated_at, p.id)),
        PostOrdering::UpdatedDesc => posts.sort_by_key(|p| Reverse((p.updated_at, p.id))),
    }
}

fn comment_matches(c: &Comment, filter: CommentFilter) -> bool {
    filter.post.map_or(true, |p| c.post_id == p) && filter.author.map_or(true, |a| c.author_id == a)
}

fn like_matches(l: &Like, filter: LikeFilter) -> bool {
    filter.post.map_or(true, |p| l.post_id == p) && filter.user.map_or(true, |u| l.user_id == u)
}

/// In-process backend. One async mutex guards all tables, so insert-if-absent
/// is atomic the same way a unique constraint makes it atomic in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags an existing user as staff; there is no API for this.
    #[cfg(test)]
    pub async fn set_staff(&self, id: Uuid, is_staff: bool) -> bool {
        let mut t = self.tables.lock().await;
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.is_staff = is_staff;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AccountRepo for MemoryStore {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.username == new.username) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            bio: new.bio,
            profile_picture: None,
            is_staff: false,
            created_at: t.now(),
        };
        t.users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.user(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_users_by_handles(&self, handles: &[String]) -> anyhow::Result<Vec<User>> {
        let t = self.tables.lock().await;
        Ok(t.users
            .iter()
            .filter(|u| handles.contains(&u.username.to_lowercase()))
            .cloned()
            .collect())
    }

    async fn list_users(
        &self,
        exclude: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let t = self.tables.lock().await;
        let mut users: Vec<User> = t.users.iter().filter(|u| u.id != exclude).cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(page(users, limit, offset))
    }

    async fn count_users(&self, exclude: Uuid) -> anyhow::Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().filter(|u| u.id != exclude).count() as i64)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.lock().await;
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(bio) = changes.bio {
            user.bio = bio;
        }
        if let Some(picture) = changes.profile_picture {
            user.profile_picture = picture;
        }
        Ok(Some(user.clone()))
    }

    async fn insert_follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        anyhow::ensure!(follower != followed, "follows_no_self constraint violated");
        if t.follows
            .iter()
            .any(|e| e.follower == follower && e.followed == followed)
        {
            return Ok(false);
        }
        let created_at = t.now();
        t.follows.push(FollowEdge {
            follower,
            followed,
            created_at,
        });
        Ok(true)
    }

    async fn delete_follow(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.follows.len();
        t.follows
            .retain(|e| !(e.follower == follower && e.followed == followed));
        Ok(t.follows.len() < before)
    }

    async fn is_following(&self, follower: Uuid, followed: Uuid) -> anyhow::Result<bool> {
        let t = self.tables.lock().await;
        Ok(t.follows
            .iter()
            .any(|e| e.follower == follower && e.followed == followed))
    }

    async fn follow_counts(&self, user: Uuid) -> anyhow::Result<FollowCounts> {
        let t = self.tables.lock().await;
        Ok(FollowCounts {
            followers_count: t.follows.iter().filter(|e| e.followed == user).count() as i64,
            following_count: t.follows.iter().filter(|e| e.follower == user).count() as i64,
        })
    }

    async fn following_ids(&self, user: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let t = self.tables.lock().await;
        Ok(t.follows
            .iter()
            .filter(|e| e.follower == user)
            .map(|e| e.followed)
            .collect())
    }

    async fn list_following(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let t = self.tables.lock().await;
        let mut edges: Vec<&FollowEdge> = t.follows.iter().filter(|e| e.follower == user).collect();
        edges.sort_by_key(|e| Reverse(e.created_at));
        let ids: Vec<Uuid> = page(edges, limit, offset).into_iter().map(|e| e.followed).collect();
        Ok(t.users_by_ids(ids.into_iter()))
    }

    async fn list_followers(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let t = self.tables.lock().await;
        let mut edges: Vec<&FollowEdge> = t.follows.iter().filter(|e| e.followed == user).collect();
        edges.sort_by_key(|e| Reverse(e.created_at));
        let ids: Vec<Uuid> = page(edges, limit, offset).into_iter().map(|e| e.follower).collect();
        Ok(t.users_by_ids(ids.into_iter()))
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn create_post(&self, author: Uuid, title: &str, content: &str) -> anyhow::Result<Post> {
        let mut t = self.tables.lock().await;
        anyhow::ensure!(t.user(author).is_some(), "post author {author} does not exist");
        let now = t.now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: author,
            title: title.to_owned(),
            content: content.to_owned(),
            created_at: now,
            updated_at: now,
        };
        t.posts.push(post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let t = self.tables.lock().await;
        Ok(t.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let t = self.tables.lock().await;
        let mut posts: Vec<Post> = t
            .posts
            .iter()
            .filter(|p| post_matches(p, filter))
            .cloned()
            .collect();
        sort_posts(&mut posts, filter.ordering);
        Ok(page(posts, limit, offset))
    }

    async fn count_posts(&self, filter: &PostFilter) -> anyhow::Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.posts.iter().filter(|p| post_matches(p, filter)).count() as i64)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> anyhow::Result<Option<Post>> {
        let mut t = self.tables.lock().await;
        let now = t.now();
        let Some(post) = t.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        post.updated_at = now;
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.posts.len();
        t.posts.retain(|p| p.id != id);
        if t.posts.len() == before {
            return Ok(false);
        }
        t.comments.retain(|c| c.post_id != id);
        t.likes.retain(|l| l.post_id != id);
        Ok(true)
    }

    async fn posts_by_authors(
        &self,
        authors: &[Uuid],
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let t = self.tables.lock().await;
        let mut posts: Vec<Post> = t
            .posts
            .iter()
            .filter(|p| authors.contains(&p.author_id))
            .cloned()
            .collect();
        sort_posts(&mut posts, PostOrdering::CreatedDesc);
        Ok(page(posts, limit, offset))
    }

    async fn count_posts_by_authors(&self, authors: &[Uuid]) -> anyhow::Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.posts.iter().filter(|p| authors.contains(&p.author_id)).count() as i64)
    }

    async fn create_comment(
        &self,
        post: Uuid,
        author: Uuid,
        content: &str,
    ) -> anyhow::Result<Comment> {
        let mut t = self.tables.lock().await;
        anyhow::ensure!(t.posts.iter().any(|p| p.id == post), "post {post} does not exist");
        let now = t.now();
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: post,
            author_id: author,
            content: content.to_owned(),
            created_at: now,
            updated_at: now,
        };
        t.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let t = self.tables.lock().await;
        Ok(t.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(
        &self,
        filter: CommentFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Comment>> {
        let t = self.tables.lock().await;
        let mut comments: Vec<Comment> = t
            .comments
            .iter()
            .filter(|c| comment_matches(c, filter))
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(page(comments, limit, offset))
    }

    async fn count_comments(&self, filter: CommentFilter) -> anyhow::Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.comments.iter().filter(|c| comment_matches(c, filter)).count() as i64)
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> anyhow::Result<Option<Comment>> {
        let mut t = self.tables.lock().await;
        let now = t.now();
        let Some(comment) = t.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        content.clone_into(&mut comment.content);
        comment.updated_at = now;
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.comments.len();
        t.comments.retain(|c| c.id != id);
        Ok(t.comments.len() < before)
    }

    async fn insert_like(&self, user: Uuid, post: Uuid) -> anyhow::Result<Option<Like>> {
        let mut t = self.tables.lock().await;
        anyhow::ensure!(t.posts.iter().any(|p| p.id == post), "post {post} does not exist");
        if t.likes.iter().any(|l| l.user_id == user && l.post_id == post) {
            return Ok(None);
        }
        let like = Like {
            id: Uuid::new_v4(),
            user_id: user,
            post_id: post,
            created_at: t.now(),
        };
        t.likes.push(like.clone());
        Ok(Some(like))
    }

    async fn delete_like(&self, user: Uuid, post: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.likes.len();
        t.likes.retain(|l| !(l.user_id == user && l.post_id == post));
        Ok(t.likes.len() < before)
    }

    async fn find_like(&self, id: Uuid) -> anyhow::Result<Option<Like>> {
        let t = self.tables.lock().await;
        Ok(t.likes.iter().find(|l| l.id == id).cloned())
    }

    async fn list_likes(
        &self,
        filter: LikeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Like>> {
        let t = self.tables.lock().await;
        let mut likes: Vec<Like> = t
            .likes
            .iter()
            .filter(|l| like_matches(l, filter))
            .cloned()
            .collect();
        likes.sort_by_key(|l| Reverse((l.created_at, l.id)));
        Ok(page(likes, limit, offset))
    }

    async fn count_likes(&self, filter: LikeFilter) -> anyhow::Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.likes.iter().filter(|l| like_matches(l, filter)).count() as i64)
    }

    async fn delete_like_by_id(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        let before = t.likes.len();
        t.likes.retain(|l| l.id != id);
        Ok(t.likes.len() < before)
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn insert_notification(&self, new: NewNotification) -> anyhow::Result<Notification> {
        let mut t = self.tables.lock().await;
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient,
            actor_id: new.actor,
            verb: new.verb,
            read: false,
            target: new.target,
            created_at: t.now(),
        };
        t.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn find_notification(&self, id: Uuid) -> anyhow::Result<Option<Notification>> {
        let t = self.tables.lock().await;
        Ok(t.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        read: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Notification>> {
        let t = self.tables.lock().await;
        let mut items: Vec<Notification> = t
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient && read.map_or(true, |r| n.read == r))
            .cloned()
            .collect();
        items.sort_by_key(|n| Reverse((n.created_at, n.id)));
        Ok(page(items, limit, offset))
    }

    async fn count_notifications(
        &self,
        recipient: Uuid,
        read: Option<bool>,
    ) -> anyhow::Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.notifications
            .iter()
            .filter(|n| n.recipient_id == recipient && read.map_or(true, |r| n.read == r))
            .count() as i64)
    }

    async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        match t.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient: Uuid) -> anyhow::Result<u64> {
        let mut t = self.tables.lock().await;
        let mut updated = 0;
        for n in t
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == recipient && !n.read)
        {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }
}
