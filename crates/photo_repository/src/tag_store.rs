use common_types::{Error, PersonCandidate, PersonGroup, PhotoTagSource, Result, Tag, new_id};
use sqlx::{Executor, Postgres};

pub struct TagStore;

impl TagStore {
    /// Looks up a tag by name, creating it if absent. `name` carries the
    /// `person:`/`person_cluster:` convention from spec.md §3 but this
    /// store treats it as an opaque string.
    pub async fn ensure_tag(
        executor: impl Executor<'_, Database = Postgres> + Copy,
        name: &str,
    ) -> Result<Tag> {
        if let Some(existing) =
            sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
                .bind(name)
                .fetch_optional(executor)
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
        {
            return Ok(existing);
        }

        let id = new_id();
        sqlx::query("INSERT INTO tags (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(&id)
            .bind(name)
            .execute(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_one(executor)
            .await
            .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn add_photo_tag(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
        tag_id: &str,
        confidence: f32,
        source: PhotoTagSource,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO photo_tags (photo, tag, confidence, source)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (photo, tag) DO UPDATE SET confidence = EXCLUDED.confidence, source = EXCLUDED.source
            ",
        )
        .bind(photo_id)
        .bind(tag_id)
        .bind(confidence)
        .bind(source.as_db_str())
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    /// Removes any prior `auto_people`-sourced person tags for this photo,
    /// so a photo carries zero or one such tag at a time (spec.md §8
    /// invariant).
    pub async fn clear_person_tags(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            DELETE FROM photo_tags
            WHERE photo = $1 AND source = 'auto_people'
              AND tag IN (SELECT id FROM tags WHERE name LIKE 'person:%' OR name LIKE 'person_cluster:%')
            ",
        )
        .bind(photo_id)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }

    /// Up to `limit` most-recently-uploaded candidates for `owner` that
    /// already carry a `person:`/`person_cluster:` tag and have an
    /// embedding (spec.md §4.10 step 1).
    pub async fn fetch_person_candidates(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<PersonCandidate>> {
        sqlx::query_as::<_, PersonCandidate>(
            r"
            SELECT p.id AS photo_id, t.id AS tag_id, t.name AS tag_name,
                   p.embedding AS embedding, p.uploaded_at AS uploaded_at
            FROM photos p
            JOIN photo_tags pt ON pt.photo = p.id AND pt.source = 'auto_people'
            JOIN tags t ON t.id = pt.tag
            WHERE p.owner = $1 AND p.is_deleted = false AND p.embedding IS NOT NULL
              AND (t.name LIKE 'person:%' OR t.name LIKE 'person_cluster:%')
            ORDER BY p.uploaded_at DESC
            LIMIT $2
            ",
        )
        .bind(owner)
        .bind(limit)
        .fetch_all(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn list_person_groups(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
    ) -> Result<Vec<PersonGroup>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT t.name, count(*) AS photo_count
            FROM photo_tags pt
            JOIN tags t ON t.id = pt.tag
            JOIN photos p ON p.id = pt.photo
            WHERE p.owner = $1 AND p.is_deleted = false
              AND (t.name LIKE 'person:%' OR t.name LIKE 'person_cluster:%')
            GROUP BY t.name
            ORDER BY photo_count DESC
            ",
        )
        .bind(owner)
        .fetch_all(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(tag_name, photo_count)| PersonGroup {
                tag_name,
                photo_count,
            })
            .collect())
    }

    /// Drops every `auto_people` person/person_cluster tag across all of
    /// `owner`'s photos, the first step of a full recluster (spec.md
    /// §4.10 `reindex`).
    pub async fn clear_owner_person_cluster_tags(
        executor: impl Executor<'_, Database = Postgres>,
        owner: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            DELETE FROM photo_tags
            WHERE source = 'auto_people'
              AND photo IN (SELECT id FROM photos WHERE owner = $1)
              AND tag IN (SELECT id FROM tags WHERE name LIKE 'person:%' OR name LIKE 'person_cluster:%')
            ",
        )
        .bind(owner)
        .execute(executor)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(())
    }
}
