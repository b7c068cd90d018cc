use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Login hands out one of each; only `Access` authenticates API calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn issued_now(
        sub: Uuid,
        kind: TokenKind,
        ttl: Duration,
        iss: &str,
        aud: &str,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            sub,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: iss.to_string(),
            aud: aud.to_string(),
            kind,
        }
    }
}
