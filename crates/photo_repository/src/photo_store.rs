use chrono::{DateTime, Utc};
use common_types::{Error, Id, NewPhoto, Photo, PhotoRow, Result, SearchHit, SearchHitRow, new_id};
use pgvector::Vector;
use sqlx::{Executor, Postgres};

pub struct PhotoStore;

/// A cursor-paginated page of photos, strictly descending by
/// `(uploaded_at, id)`. `next_cursor` is set iff the page was full.
#[derive(Debug, Clone)]
pub struct PaginationPage {
    pub items: Vec<Photo>,
    pub next_cursor: Option<(DateTime<Utc>, Id)>,
}

/// One phash-sharing group of live photos, newest first.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub perceptual_hash: String,
    pub photos: Vec<Photo>,
}

const PHOTO_COLUMNS: &str = r"
    id, owner, storage_key, thumbnail_key, original_filename, size_bytes, mime, width, height,
    taken_at, uploaded_at, source, source_id, perceptual_hash, embedding,
    embedding_generated_at, gps_lat, gps_lng, camera_make, caption, is_deleted
";

impl PhotoStore {
    /// Inserts a freshly-ingested photo. A unique-constraint violation on
    /// `(owner, source, source_id)` or `(owner, perceptual_hash)` maps to
    /// `DuplicateSource` rather than a bare internal error, per spec.md §7.
    pub async fn insert_photo(
        executor: impl Executor<'_, Database = Postgres>,
        photo: &NewPhoto,
    ) -> Result<Photo> {
        let id = new_id();
        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            r"
            INSERT INTO photos (
                id, owner, storage_key, thumbnail_key, original_filename, size_bytes, mime,
                width, height, taken_at, source, source_id, perceptual_hash,
                gps_lat, gps_lng, camera_make
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {PHOTO_COLUMNS}
            "
        ))
        .bind(&id)
        .bind(&photo.owner)
        .bind(&photo.storage_key)
        .bind(&photo.thumbnail_key)
        .bind(&photo.original_filename)
        .bind(photo.size_bytes)
        .bind(&photo.mime)
        .bind(photo.width)
        .bind(photo.height)
        .bind(photo.taken_at)
        .bind(photo.source.as_db_str())
        .bind(&photo.source_id)
        .bind(&photo.perceptual_hash)
        .bind(photo.gps_lat)
        .bind(photo.gps_lng)
        .bind(&photo.camera_make)
        .fetch_one(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::DuplicateSource(photo.original_filename.clone())
            }
            other => Error::Internal(other.to_string()),
        })?;
        Ok(row.into())
    }

    pub async fn dedup_exists(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        perceptual_hash: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM photos WHERE owner = $1 AND perceptual_hash = $2 AND is_deleted = false)",
        )
        .bind(owner)
        .bind(perceptual_hash)
        .fetch_one(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(exists)
    }

    pub async fn source_exists(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        source: &str,
        source_id: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM photos WHERE owner = $1 AND source = $2 AND source_id = $3)",
        )
        .bind(owner)
        .bind(source)
        .bind(source_id)
        .fetch_one(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(exists)
    }

    pub async fn find_by_id(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
    ) -> Result<Option<Photo>> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1"
        ))
        .bind(photo_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    /// Writes the embedding exactly once: a no-op (not an error) if the
    /// photo already has one, implementing the compare-and-set-on-null
    /// idempotency required for multi-worker safety (spec.md §4.9, §5).
    pub async fn set_embedding(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
        vector: &[f32],
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE photos SET embedding = $1, embedding_generated_at = now()
             WHERE id = $2 AND embedding IS NULL",
        )
        .bind(Vector::from(vector.to_vec()))
        .bind(photo_id)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_embedding(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
    ) -> Result<Option<Vec<f32>>> {
        let vector: Option<Vector> =
            sqlx::query_scalar("SELECT embedding FROM photos WHERE id = $1")
                .bind(photo_id)
                .fetch_optional(executor)
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
                .flatten();
        Ok(vector.map(|v| v.to_vec()))
    }

    /// Cosine-distance search. `probes` tunes the IVF index's recall for
    /// this query only (`SET LOCAL`, so it never leaks to other
    /// statements on the connection); caller is expected to run this
    /// inside a transaction so `SET LOCAL` takes effect.
    pub async fn search(
        tx: &mut sqlx::PgConnection,
        owner: &str,
        query_vector: &[f32],
        limit: i64,
        offset: i64,
        probes: u32,
    ) -> Result<Vec<SearchHit>> {
        sqlx::query(&format!("SET LOCAL ivfflat.probes = {probes}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let rows = sqlx::query_as::<_, SearchHitRow>(&format!(
            r"
            SELECT {PHOTO_COLUMNS}, (embedding <=> $1) AS distance
            FROM photos
            WHERE owner = $2 AND is_deleted = false AND embedding IS NOT NULL
            ORDER BY embedding <=> $1
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(Vector::from(query_vector.to_vec()))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(tx)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                photo: r.photo.into(),
                #[allow(clippy::cast_possible_truncation)]
                score: 1.0 - r.distance as f32,
            })
            .collect())
    }

    /// Strict-descending `(uploaded_at, id)` keyset pagination.
    /// `next_cursor` is populated only when a full page was returned.
    pub async fn paginate_photos(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        cursor: Option<(DateTime<Utc>, Id)>,
        limit: i64,
        include_deleted: bool,
    ) -> Result<PaginationPage> {
        let rows = match cursor {
            Some((ts, id)) => {
                sqlx::query_as::<_, PhotoRow>(&format!(
                    r"
                    SELECT {PHOTO_COLUMNS} FROM photos
                    WHERE owner = $1 AND (is_deleted = false OR $2)
                      AND (uploaded_at, id) < ($3, $4)
                    ORDER BY uploaded_at DESC, id DESC
                    LIMIT $5
                    "
                ))
                .bind(owner)
                .bind(include_deleted)
                .bind(ts)
                .bind(id)
                .bind(limit)
                .fetch_all(executor)
                .await
            }
            None => {
                sqlx::query_as::<_, PhotoRow>(&format!(
                    r"
                    SELECT {PHOTO_COLUMNS} FROM photos
                    WHERE owner = $1 AND (is_deleted = false OR $2)
                    ORDER BY uploaded_at DESC, id DESC
                    LIMIT $3
                    "
                ))
                .bind(owner)
                .bind(include_deleted)
                .bind(limit)
                .fetch_all(executor)
                .await
            }
        }
        .map_err(|e| Error::Internal(e.to_string()))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let is_full = rows.len() as i64 == limit;
        let items: Vec<Photo> = rows.into_iter().map(Into::into).collect();
        let next_cursor = if is_full {
            items.last().map(|p| (p.uploaded_at, p.id.clone()))
        } else {
            None
        };

        Ok(PaginationPage { items, next_cursor })
    }

    /// Groups live photos by perceptual hash where more than one photo
    /// shares it, newest-first within each group, largest groups first.
    pub async fn duplicate_groups(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
    ) -> Result<Vec<DuplicateGroup>> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            r"
            SELECT {PHOTO_COLUMNS} FROM photos p
            WHERE owner = $1 AND is_deleted = false
              AND perceptual_hash IN (
                SELECT perceptual_hash FROM photos
                WHERE owner = $1 AND is_deleted = false
                GROUP BY perceptual_hash
                HAVING count(*) > 1
              )
            ORDER BY perceptual_hash, uploaded_at DESC, id DESC
            "
        ))
        .bind(owner)
        .fetch_all(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for row in rows {
            let photo: Photo = row.into();
            match groups.last_mut() {
                Some(g) if g.perceptual_hash == photo.perceptual_hash => g.photos.push(photo),
                _ => groups.push(DuplicateGroup {
                    perceptual_hash: photo.perceptual_hash.clone(),
                    photos: vec![photo],
                }),
            }
        }
        groups.sort_by(|a, b| b.photos.len().cmp(&a.photos.len()));
        Ok(groups)
    }

    /// Every embedded, live photo for `owner` oldest-first, used to rebuild
    /// person clusters from scratch in upload order.
    pub async fn list_embedded_for_reindex(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
    ) -> Result<Vec<Photo>> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            r"
            SELECT {PHOTO_COLUMNS} FROM photos
            WHERE owner = $1 AND is_deleted = false AND embedding IS NOT NULL
            ORDER BY uploaded_at ASC, id ASC
            "
        ))
        .bind(owner)
        .fetch_all(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn soft_delete(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE photos SET is_deleted = true WHERE id = $1")
            .bind(photo_id)
            .execute(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn restore(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE photos SET is_deleted = false WHERE id = $1")
            .bind(photo_id)
            .execute(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    /// Removes the row outright. Callers are responsible for deleting the
    /// associated storage objects first (spec.md §4.14 — storage cleanup
    /// errors are swallowed and logged, never block the DB delete).
    pub async fn hard_delete(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(photo_id)
            .execute(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_groups_sort_largest_first() {
        let mut groups = vec![
            DuplicateGroup {
                perceptual_hash: "a".into(),
                photos: vec![],
            },
            DuplicateGroup {
                perceptual_hash: "b".into(),
                photos: vec![],
            },
        ];
        groups[0].photos = vec![fake_photo("1"), fake_photo("2")];
        groups[1].photos = vec![fake_photo("3"), fake_photo("4"), fake_photo("5")];
        groups.sort_by(|a, b| b.photos.len().cmp(&a.photos.len()));
        assert_eq!(groups[0].perceptual_hash, "b");
    }

    fn fake_photo(id: &str) -> Photo {
        Photo {
            id: id.to_string(),
            owner: "owner".into(),
            storage_key: String::new(),
            thumbnail_key: String::new(),
            original_filename: String::new(),
            size_bytes: 0,
            mime: String::new(),
            width: 0,
            height: 0,
            taken_at: None,
            uploaded_at: Utc::now(),
            source: common_types::PhotoSource::Manual,
            source_id: None,
            perceptual_hash: "hash".into(),
            embedding: None,
            embedding_generated_at: None,
            gps_lat: None,
            gps_lng: None,
            camera_make: None,
            caption: None,
            is_deleted: false,
        }
    }
}
