use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    dto::{NotificationResponse, TargetObject, UnreadResponse},
    repo::NotificationRepo,
    repo_types::{NewNotification, Notification, NotificationTarget, Verb},
};
use crate::{
    accounts::{dto::UserSummary, repo::AccountRepo},
    error::{AppError, AppResult},
    pagination::{Page, PageRequest},
    posts::{repo::PostRepo, repo_types::Comment},
    store::Store,
};

const COMMENT_PREVIEW_CHARS: usize = 50;
const UNREAD_PREVIEW_LEN: i64 = 10;

/// Records one notification. Self-notifications are skipped and store
/// failures are logged, never returned: the caller's write already happened.
pub async fn notify(
    store: &dyn Store,
    recipient: Uuid,
    actor: Uuid,
    verb: Verb,
    target: Option<NotificationTarget>,
) {
    if recipient == actor {
        return;
    }
    let new = NewNotification {
        recipient,
        actor,
        verb,
        target,
    };
    match store.insert_notification(new).await {
        Ok(n) => debug!(notification_id = %n.id, %recipient, verb = verb.as_str(), "notification created"),
        Err(e) => warn!(error = ?e, %recipient, %actor, verb = verb.as_str(), "notification fan-out failed"),
    }
}

/// Lowercased `@username` handles in order of first appearance.
pub fn extract_mentions(content: &str) -> Vec<String> {
    lazy_static! {
        static ref MENTION_RE: Regex = Regex::new(r"@([a-zA-Z0-9_]+)").unwrap();
    }
    let mut seen = HashSet::new();
    MENTION_RE
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Fan-out for a freshly created comment: `comment` to the post author,
/// `mention` to every other user named in the text.
pub async fn notify_comment(store: &dyn Store, post_author: Uuid, comment: &Comment) {
    let actor = comment.author_id;
    notify(
        store,
        post_author,
        actor,
        Verb::Comment,
        Some(NotificationTarget::Post(comment.post_id)),
    )
    .await;

    let handles = extract_mentions(&comment.content);
    if handles.is_empty() {
        return;
    }
    let mentioned = match store.find_users_by_handles(&handles).await {
        Ok(users) => users,
        Err(e) => {
            warn!(error = ?e, ?handles, "mention lookup failed");
            return;
        }
    };
    for user in mentioned.into_iter().filter(|u| u.id != post_author) {
        notify(
            store,
            user.id,
            actor,
            Verb::Mention,
            Some(NotificationTarget::Comment(comment.id)),
        )
        .await;
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > COMMENT_PREVIEW_CHARS {
        let cut: String = content.chars().take(COMMENT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

/// `None` when the target was deleted after the notification was written.
pub async fn resolve_target(
    store: &dyn Store,
    target: NotificationTarget,
) -> AppResult<Option<TargetObject>> {
    Ok(match target {
        NotificationTarget::Post(id) => store.find_post(id).await?.map(|p| TargetObject::Post {
            id: p.id,
            title: p.title,
        }),
        NotificationTarget::Comment(id) => {
            store
                .find_comment(id)
                .await?
                .map(|c| TargetObject::Comment {
                    id: c.id,
                    content: preview(&c.content),
                })
        }
    })
}

async fn to_response(store: &dyn Store, n: Notification) -> AppResult<NotificationResponse> {
    let actor_details = store.find_user(n.actor_id).await?.map(|u| UserSummary::from(&u));
    let target_object = match n.target {
        Some(target) => resolve_target(store, target).await?,
        None => None,
    };
    Ok(NotificationResponse {
        id: n.id,
        recipient: n.recipient_id,
        actor: n.actor_id,
        actor_details,
        verb: n.verb,
        read: n.read,
        target_object,
        timestamp: n.created_at,
    })
}

async fn to_responses(
    store: &dyn Store,
    list: Vec<Notification>,
) -> AppResult<Vec<NotificationResponse>> {
    let mut out = Vec::with_capacity(list.len());
    for n in list {
        out.push(to_response(store, n).await?);
    }
    Ok(out)
}

/// Looks up a notification owned by `user`; anyone else's is `NotFound`.
async fn owned(store: &dyn Store, user: Uuid, id: Uuid) -> AppResult<Notification> {
    match store.find_notification(id).await? {
        Some(n) if n.recipient_id == user => Ok(n),
        _ => Err(AppError::NotFound),
    }
}

pub async fn list_notifications(
    store: &dyn Store,
    user: Uuid,
    read: Option<bool>,
    page: PageRequest,
) -> AppResult<Page<NotificationResponse>> {
    let count = store.count_notifications(user, read).await?;
    let rows = store
        .list_notifications(user, read, page.limit(), page.offset())
        .await?;
    Ok(Page::new(to_responses(store, rows).await?, count, page))
}

pub async fn unread(store: &dyn Store, user: Uuid) -> AppResult<UnreadResponse> {
    let unread_count = store.count_notifications(user, Some(false)).await?;
    let rows = store
        .list_notifications(user, Some(false), UNREAD_PREVIEW_LEN, 0)
        .await?;
    Ok(UnreadResponse {
        unread_count,
        notifications: to_responses(store, rows).await?,
    })
}

/// Opening a notification marks it read.
pub async fn retrieve(store: &dyn Store, user: Uuid, id: Uuid) -> AppResult<NotificationResponse> {
    let mut n = owned(store, user, id).await?;
    if !n.read {
        store.mark_read(n.id).await?;
        n.read = true;
    }
    to_response(store, n).await
}

pub async fn mark_as_read(store: &dyn Store, user: Uuid, id: Uuid) -> AppResult<()> {
    let n = owned(store, user, id).await?;
    store.mark_read(n.id).await?;
    Ok(())
}

pub async fn mark_all_as_read(store: &dyn Store, user: Uuid) -> AppResult<u64> {
    let updated = store.mark_all_read(user).await?;
    debug!(%user, updated, "notifications marked read");
    Ok(updated)
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

    #[test]
    fn mentions_are_lowercased_and_deduplicated() {
        assert_eq!(
            extract_mentions("@Alice and @bob_1, then @ALICE again"),
            vec!["alice", "bob_1"]
        );
        assert!(extract_mentions("mail me at nobody").is_empty());
    }

    #[test]
    fn long_comments_are_cut_for_previews() {
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"é".repeat(50)), "é".repeat(50));
    }

    #[tokio::test]
    async fn self_notifications_are_skipped() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        notify(&store, a.id, a.id, Verb::Follow, None).await;
        assert_eq!(store.count_notifications(a.id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn comment_fan_out_notifies_author_and_mentions() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let commenter = user(&store, "commenter").await;
        let carol = user(&store, "carol").await;

        let post = store.create_post(author.id, "Hello", "world").await.unwrap();
        let comment = store
            .create_comment(
                post.id,
                commenter.id,
                "@Carol @author @commenter @ghost look at this",
            )
            .await
            .unwrap();
        notify_comment(&store, author.id, &comment).await;

        let to_author = store.list_notifications(author.id, None, 10, 0).await.unwrap();
        assert_eq!(to_author.len(), 1);
        assert_eq!(to_author[0].verb, Verb::Comment);
        assert_eq!(to_author[0].target, Some(NotificationTarget::Post(post.id)));

        let to_carol = store.list_notifications(carol.id, None, 10, 0).await.unwrap();
        assert_eq!(to_carol.len(), 1);
        assert_eq!(to_carol[0].verb, Verb::Mention);
        assert_eq!(
            to_carol[0].target,
            Some(NotificationTarget::Comment(comment.id))
        );

        assert_eq!(store.count_notifications(commenter.id, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mixed_case_usernames_can_be_mentioned() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let commenter = user(&store, "commenter").await;
        let alice = user(&store, "Alice").await;
        let bob = user(&store, "BOB_2").await;

        let post = store.create_post(author.id, "Hello", "world").await.unwrap();
        let comment = store
            .create_comment(post.id, commenter.id, "@Alice and @bob_2, again @alice")
            .await
            .unwrap();
        notify_comment(&store, author.id, &comment).await;

        for mentioned in [&alice, &bob] {
            let got = store.list_notifications(mentioned.id, None, 10, 0).await.unwrap();
            assert_eq!(got.len(), 1, "{} should get one mention", mentioned.username);
            assert_eq!(got[0].verb, Verb::Mention);
        }
    }

    #[tokio::test]
    async fn reading_is_scoped_to_the_recipient() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        notify(&store, a.id, b.id, Verb::Follow, None).await;
        let id = store.list_notifications(a.id, None, 1, 0).await.unwrap()[0].id;

        assert!(matches!(
            mark_as_read(&store, b.id, id).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(retrieve(&store, b.id, id).await, Err(AppError::NotFound)));

        mark_as_read(&store, a.id, id).await.unwrap();
        mark_as_read(&store, a.id, id).await.unwrap();
        let summary = unread(&store, a.id).await.unwrap();
        assert_eq!(summary.unread_count, 0);
        assert!(summary.notifications.is_empty());
    }

    #[tokio::test]
    async fn retrieve_marks_read_and_resolves_targets() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let post = store.create_post(a.id, "Title", "body").await.unwrap();
        notify(&store, a.id, b.id, Verb::Like, Some(NotificationTarget::Post(post.id))).await;
        let id = store.list_notifications(a.id, None, 1, 0).await.unwrap()[0].id;

        let shown = retrieve(&store, a.id, id).await.unwrap();
        assert!(shown.read);
        assert_eq!(
            shown.target_object,
            Some(TargetObject::Post {
                id: post.id,
                title: "Title".into()
            })
        );
        assert_eq!(shown.actor_details.unwrap().username, "b");

        store.delete_post(post.id).await.unwrap();
        let shown = retrieve(&store, a.id, id).await.unwrap();
        assert_eq!(shown.target_object, None);
    }

    #[tokio::test]
    async fn mark_all_counts_only_unread() {
        let store = MemoryStore::new();
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        for _ in 0..3 {
            notify(&store, a.id, b.id, Verb::Follow, None).await;
        }
        let first = store.list_notifications(a.id, None, 1, 0).await.unwrap()[0].id;
        mark_as_read(&store, a.id, first).await.unwrap();

        assert_eq!(mark_all_as_read(&store, a.id).await.unwrap(), 2);
        assert_eq!(mark_all_as_read(&store, a.id).await.unwrap(), 0);

        let page = list_notifications(&store, a.id, Some(true), PageRequest::first(20))
            .await
            .unwrap();
        assert_eq!(page.count, 3);
    }
}
