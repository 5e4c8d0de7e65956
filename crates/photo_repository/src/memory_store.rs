use chrono::{DateTime, NaiveDate, Utc};
use common_types::{Error, Id, Photo, PhotoRow, Result, new_id};
use sqlx::types::Json;
use sqlx::{Executor, Postgres};

pub struct MemoryStore;

impl MemoryStore {
    pub async fn list_owners_with_photos(
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<Vec<Id>> {
        sqlx::query_scalar("SELECT DISTINCT owner FROM photos WHERE is_deleted = false")
            .fetch_all(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))
    }

    /// Photos with `taken_at` set, older than one year, whose month/day
    /// matches `today`, newest-first, capped to the most recent 10
    /// (spec.md §4.12).
    pub async fn find_anniversary_photos(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        today: NaiveDate,
    ) -> Result<Vec<Photo>> {
        let one_year_ago = today - chrono::Duration::days(365);
        #[allow(clippy::cast_possible_wrap)]
        let month = today.format("%m").to_string().parse::<i32>().unwrap_or(1);
        #[allow(clippy::cast_possible_wrap)]
        let day = today.format("%d").to_string().parse::<i32>().unwrap_or(1);

        let rows = sqlx::query_as::<_, PhotoRow>(
            r"
            SELECT id, owner, storage_key, thumbnail_key, original_filename, size_bytes, mime,
                   width, height, taken_at, uploaded_at, source, source_id, perceptual_hash,
                   embedding, embedding_generated_at, gps_lat, gps_lng, camera_make, caption, is_deleted
            FROM photos
            WHERE owner = $1 AND is_deleted = false AND taken_at IS NOT NULL
              AND taken_at < $2
              AND EXTRACT(MONTH FROM taken_at) = $3 AND EXTRACT(DAY FROM taken_at) = $4
            ORDER BY taken_at DESC
            LIMIT 10
            ",
        )
        .bind(owner)
        .bind(DateTime::<Utc>::from_naive_utc_and_offset(
            one_year_ago.and_hms_opt(0, 0, 0).unwrap(),
            Utc,
        ))
        .bind(month)
        .bind(day)
        .fetch_all(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Deletes any prior memory row for `(owner, memory_date)` and inserts
    /// the replacement, keeping at most one live row per day (spec.md §3).
    pub async fn replace_memory(
        executor: impl Executor<'_, Database = Postgres> + Copy,
        owner: &str,
        memory_date: NaiveDate,
        label: &str,
        photo_ids: &[Id],
    ) -> Result<()> {
        sqlx::query("DELETE FROM memories WHERE owner = $1 AND memory_date = $2")
            .bind(owner)
            .bind(memory_date)
            .execute(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let id = new_id();
        sqlx::query(
            "INSERT INTO memories (id, owner, memory_date, label, photo_ids) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&id)
        .bind(owner)
        .bind(memory_date)
        .bind(label)
        .bind(Json(photo_ids.to_vec()))
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }
}
