use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Follow,
    Like,
    Comment,
    Mention,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Follow => "follow",
            Verb::Like => "like",
            Verb::Comment => "comment",
            Verb::Mention => "mention",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "follow" => Some(Verb::Follow),
            "like" => Some(Verb::Like),
            "comment" => Some(Verb::Comment),
            "mention" => Some(Verb::Mention),
            _ => None,
        }
    }
}

/// What a notification points at, persisted as `(target_kind, target_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    Post(Uuid),
    Comment(Uuid),
}

impl NotificationTarget {
    pub fn kind(self) -> &'static str {
        match self {
            NotificationTarget::Post(_) => "post",
            NotificationTarget::Comment(_) => "comment",
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            NotificationTarget::Post(id) | NotificationTarget::Comment(id) => id,
        }
    }

    pub fn from_parts(kind: Option<&str>, id: Option<Uuid>) -> Option<Self> {
        match (kind, id) {
            (Some("post"), Some(id)) => Some(NotificationTarget::Post(id)),
            (Some("comment"), Some(id)) => Some(NotificationTarget::Comment(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub verb: Verb,
    pub read: bool,
    pub target: Option<NotificationTarget>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub verb: String,
    pub read: bool,
    pub target_kind: Option<String>,
    pub target_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(r: NotificationRow) -> Result<Self, Self::Error> {
        let verb = Verb::parse(&r.verb)
            .ok_or_else(|| anyhow::anyhow!("unknown notification verb {:?}", r.verb))?;
        Ok(Self {
            id: r.id,
            recipient_id: r.recipient_id,
            actor_id: r.actor_id,
            verb,
            read: r.read,
            target: NotificationTarget::from_parts(r.target_kind.as_deref(), r.target_id),
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewNotification {
    pub recipient: Uuid,
    pub actor: Uuid,
    pub verb: Verb,
    pub target: Option<NotificationTarget>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_round_trips_through_its_column_value() {
        for verb in [Verb::Follow, Verb::Like, Verb::Comment, Verb::Mention] {
            assert_eq!(Verb::parse(verb.as_str()), Some(verb));
        }
        assert_eq!(Verb::parse("poke"), None);
    }

    #[test]
    fn target_needs_both_parts() {
        let id = Uuid::new_v4();
        assert_eq!(
            NotificationTarget::from_parts(Some("comment"), Some(id)),
            Some(NotificationTarget::Comment(id))
        );
        assert_eq!(NotificationTarget::from_parts(Some("post"), None), None);
        assert_eq!(NotificationTarget::from_parts(None, Some(id)), None);
        assert_eq!(NotificationTarget::from_parts(Some("user"), Some(id)), None);
    }

    #[test]
    fn unknown_verb_row_is_rejected() {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            verb: "poke".into(),
            read: false,
            target_kind: None,
            target_id: None,
            created_at: OffsetDateTime::now_utc(),
        };
        assert!(Notification::try_from(row).is_err());
    }
}
