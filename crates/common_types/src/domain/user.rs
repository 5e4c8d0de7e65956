use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Id;

/// Stable identity owning every other entity. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// (provider, provider_user_id) -> user, holding the refresh token for the
/// external Drive-like source. Owned by the user; revocable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OAuthLink {
    pub id: Id,
    pub user_id: Id,
    pub provider: String,
    pub provider_user_id: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl OAuthLink {
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}
