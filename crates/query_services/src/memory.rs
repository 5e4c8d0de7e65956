//! C12 — Memory Generator: daily "N years ago" resurfacing.

use chrono::{Datelike, NaiveDate};
use common_types::{Photo, Result};
use photo_repository::MemoryStore;
use sqlx::PgPool;

/// Regenerates `today`'s memory for every owner with at least one photo.
/// Returns how many owners got a (non-empty) memory. One row per owner
/// per day (`memories_owner_date_key`).
pub async fn generate_daily_memories(pool: &PgPool, today: NaiveDate) -> Result<u64> {
    let owners = MemoryStore::list_owners_with_photos(pool).await?;
    let mut generated = 0u64;

    for owner in owners {
        let photos = MemoryStore::find_anniversary_photos(pool, &owner, today).await?;
        if photos.is_empty() {
            continue;
        }

        let label = build_label(&photos, today);
        let photo_ids: Vec<String> = photos.iter().map(|p| p.id.clone()).collect();
        MemoryStore::replace_memory(pool, &owner, today, &label, &photo_ids).await?;
        generated += 1;
    }

    tracing::info!(generated, %today, "daily memory generation complete");
    Ok(generated)
}

/// Builds the `"<N> years ago"` label from the oldest selected photo:
/// `years = max(1, current_year − min(year among selected))` (spec.md
/// §4.12, §8 scenario 6).
fn build_label(photos: &[Photo], today: NaiveDate) -> String {
    let min_year = photos.iter().filter_map(|p| p.taken_at).map(|t| t.year()).min();

    let Some(min_year) = min_year else {
        return "On this day".to_string();
    };
    let years = (today.year() - min_year).max(1);
    format!("{years} year{} ago", plural(years))
}

fn plural(years: i32) -> &'static str {
    if years == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common_types::PhotoSource;

    fn photo_taken(years_ago: i32, today: NaiveDate) -> Photo {
        let taken_year = today.year() - years_ago;
        Photo {
            id: format!("p{years_ago}"),
            owner: "owner".into(),
            storage_key: String::new(),
            thumbnail_key: String::new(),
            original_filename: String::new(),
            size_bytes: 0,
            mime: String::new(),
            width: 0,
            height: 0,
            taken_at: Some(
                Utc.with_ymd_and_hms(taken_year, today.month(), today.day(), 0, 0, 0)
                    .unwrap(),
            ),
            uploaded_at: Utc::now(),
            source: PhotoSource::Manual,
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

    #[test]
    fn single_year_label_is_singular() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let photos = vec![photo_taken(1, today)];
        assert_eq!(build_label(&photos, today), "1 year ago");
    }

    #[test]
    fn label_uses_the_oldest_selected_year() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let photos = vec![
            photo_taken(2, today),
            photo_taken(5, today),
            photo_taken(2, today),
        ];
        assert_eq!(build_label(&photos, today), "5 years ago");
    }
}
