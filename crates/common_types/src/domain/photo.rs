use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::Row;
use sqlx::types::Json;

use crate::Id;

pub const EMBED_DIM: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoSource {
    Manual,
    Drive,
}

impl std::fmt::Display for PhotoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhotoSource::Manual => write!(f, "manual"),
            PhotoSource::Drive => write!(f, "drive"),
        }
    }
}

impl PhotoSource {
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            PhotoSource::Manual => "manual",
            PhotoSource::Drive => "drive",
        }
    }
}

/// A single photo owned by a user.
///
/// Invariants: `(owner, source, source_id)` is unique when `source_id` is
/// set; `(owner, perceptual_hash)` has at most one live row; soft-deleted
/// rows retain their storage keys until hard delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Id,
    pub owner: Id,
    pub storage_key: String,
    pub thumbnail_key: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub mime: String,
    pub width: i32,
    pub height: i32,
    pub taken_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub source: PhotoSource,
    /// Opaque, possibly composite `fileId:entryPath` for ZIP entries.
    pub source_id: Option<String>,
    pub perceptual_hash: String,
    pub embedding: Option<Vec<f32>>,
    pub embedding_generated_at: Option<DateTime<Utc>>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub camera_make: Option<String>,
    pub caption: Option<String>,
    pub is_deleted: bool,
}

/// Row shape returned directly by `sqlx`; embeddings come back as the
/// native `pgvector` type and are unpacked into a plain `Vec<f32>` for the
/// rest of the workspace so only the repository crate depends on pgvector
/// wire types.
#[derive(Debug, Clone, FromRow)]
pub struct PhotoRow {
    pub id: Id,
    pub owner: Id,
    pub storage_key: String,
    pub thumbnail_key: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub mime: String,
    pub width: i32,
    pub height: i32,
    pub taken_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub source: String,
    pub source_id: Option<String>,
    pub perceptual_hash: String,
    pub embedding: Option<Vector>,
    pub embedding_generated_at: Option<DateTime<Utc>>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub camera_make: Option<String>,
    pub caption: Option<String>,
    pub is_deleted: bool,
}

impl From<PhotoRow> for Photo {
    fn from(r: PhotoRow) -> Self {
        Self {
            id: r.id,
            owner: r.owner,
            storage_key: r.storage_key,
            thumbnail_key: r.thumbnail_key,
            original_filename: r.original_filename,
            size_bytes: r.size_bytes,
            mime: r.mime,
            width: r.width,
            height: r.height,
            taken_at: r.taken_at,
            uploaded_at: r.uploaded_at,
            source: if r.source == "drive" {
                PhotoSource::Drive
            } else {
                PhotoSource::Manual
            },
            source_id: r.source_id,
            perceptual_hash: r.perceptual_hash,
            embedding: r.embedding.map(|v| v.to_vec()),
            embedding_generated_at: r.embedding_generated_at,
            gps_lat: r.gps_lat,
            gps_lng: r.gps_lng,
            camera_make: r.camera_make,
            caption: r.caption,
            is_deleted: r.is_deleted,
        }
    }
}

/// A freshly-ingested photo, not yet assigned an id or storage keys.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub owner: Id,
    pub storage_key: String,
    pub thumbnail_key: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub mime: String,
    pub width: i32,
    pub height: i32,
    pub taken_at: Option<DateTime<Utc>>,
    pub source: PhotoSource,
    pub source_id: Option<String>,
    pub perceptual_hash: String,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub camera_make: Option<String>,
}

/// EXIF extraction result. Every field is optional; a decode error yields
/// `Exif::default()` rather than propagating, per spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exif {
    pub taken_at: Option<chrono::NaiveDateTime>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A cosine-distance search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub photo: Photo,
    pub score: f32,
}

/// A page of search results (spec.md §4.11 steps 3-4): at most `limit`
/// items plus pagination state derived from having fetched one extra row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<SearchHit>,
    pub has_more: bool,
    pub next_offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SearchHitRow {
    pub photo: PhotoRow,
    pub distance: f64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SearchHitRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            photo: PhotoRow::from_row(row)?,
            distance: row.try_get("distance")?,
        })
    }
}

/// `sqlx::query_as!`-friendly wrapper for a `Photo` serialized as JSON, used
/// by the memory generator to store the set of selected ids compactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoIds(pub Vec<Id>);

impl From<Json<Vec<Id>>> for PhotoIds {
    fn from(j: Json<Vec<Id>>) -> Self {
        Self(j.0)
    }
}
