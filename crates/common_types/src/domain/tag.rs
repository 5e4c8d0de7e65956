use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Id;

pub const PERSON_TAG_PREFIX: &str = "person:";
pub const PERSON_CLUSTER_TAG_PREFIX: &str = "person_cluster:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoTagSource {
    AutoClip,
    AutoPeople,
    ManualPerson,
    Manual,
}

impl PhotoTagSource {
    #[must_use]
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PhotoTagSource::AutoClip => "auto_clip",
            PhotoTagSource::AutoPeople => "auto_people",
            PhotoTagSource::ManualPerson => "manual_person",
            PhotoTagSource::Manual => "manual",
        }
    }

    #[must_use]
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "auto_clip" => PhotoTagSource::AutoClip,
            "manual_person" => PhotoTagSource::ManualPerson,
            "manual" => PhotoTagSource::Manual,
            _ => PhotoTagSource::AutoPeople,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Id,
    pub name: String,
}

impl Tag {
    #[must_use]
    pub fn person_name(label: &str) -> String {
        format!("{PERSON_TAG_PREFIX}{label}")
    }

    #[must_use]
    pub fn person_cluster_name(token: &str) -> String {
        format!("{PERSON_CLUSTER_TAG_PREFIX}{token}")
    }

    #[must_use]
    pub fn is_person_like(name: &str) -> bool {
        name.starts_with(PERSON_TAG_PREFIX) || name.starts_with(PERSON_CLUSTER_TAG_PREFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PhotoTag {
    pub photo: Id,
    pub tag: Id,
    pub confidence: f32,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// A `person:`/`person_cluster:` tag together with the embedding that
/// anchors it, as used by the people clusterer's nearest-candidate search.
#[derive(Debug, Clone, FromRow)]
pub struct PersonCandidate {
    pub photo_id: Id,
    pub tag_id: Id,
    pub tag_name: String,
    pub embedding: pgvector::Vector,
    pub uploaded_at: DateTime<Utc>,
}

/// One named or synthetic person group, with its member photo count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonGroup {
    pub tag_name: String,
    pub photo_count: i64,
}
