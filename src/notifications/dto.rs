use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Verb;
use crate::accounts::dto::UserSummary;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    /// `true` / `false`; anything else is ignored.
    pub read: Option<String>,
}

impl NotificationFilter {
    pub fn read_flag(&self) -> Option<bool> {
        match self.read.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        }
    }
}

/// Resolved target, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetObject {
    Post { id: Uuid, title: String },
    Comment { id: Uuid, content: String },
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub recipient: Uuid,
    pub actor: Uuid,
    pub actor_details: Option<UserSummary>,
    pub verb: Verb,
    pub read: bool,
    pub target_object: Option<TargetObject>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub unread_count: i64,
    pub notifications: Vec<NotificationResponse>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MarkAllResponse {
    pub message: String,
    pub updated: u64,
}
