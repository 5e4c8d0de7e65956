use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Id;

/// Owner-scoped collection of photos. `cover_photo` is a nullable FK set to
/// `ON DELETE SET NULL` rather than an owning reference, avoiding the
/// Album <-> Photo reference cycle the original code carried in memory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: Id,
    pub owner: Id,
    pub name: String,
    pub cover_photo: Option<Id>,
    pub public_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlbumPhoto {
    pub album: Id,
    pub photo: Id,
    pub position: i32,
}
