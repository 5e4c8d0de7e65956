//! C10 — People Clusterer: incremental nearest-candidate assignment of a
//! `person:`/`person_cluster:` tag to every newly-embedded photo.
//!
//! Unlike the batch HDBSCAN reclustering job the algorithm is fixed: for
//! each new embedding, compare against up to `cluster_candidates` recent
//! same-owner tagged photos and either join the closest cluster (cosine
//! similarity >= `cluster_threshold`) or mint a new one.

use common_types::{PhotoTagSource, Result, Tag, new_id};
use photo_repository::{PhotoStore, TagStore};
use sqlx::PgPool;

pub const DEFAULT_THRESHOLD: f32 = 0.86;
pub const DEFAULT_CANDIDATES: i64 = 600;
const REINDEX_COMMIT_EVERY: usize = 100;

/// Assigns (or mints) a person cluster tag for one freshly-embedded photo.
/// Returns the tag name it ended up attached to.
pub async fn assign_cluster(
    pool: &PgPool,
    owner: &str,
    photo_id: &str,
    embedding: &[f32],
    candidates_limit: i64,
    threshold: f32,
) -> Result<String> {
    let candidates = TagStore::fetch_person_candidates(pool, owner, candidates_limit).await?;

    let best = candidates
        .iter()
        .filter(|c| c.photo_id != photo_id)
        .map(|c| (c, cosine_similarity(embedding, &c.embedding.to_vec())))
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let (tag_name, confidence) = match best {
        Some((candidate, similarity)) if similarity >= threshold => {
            (candidate.tag_name.clone(), similarity.max(1.0))
        }
        _ => (Tag::person_cluster_name(&new_id()), 1.0),
    };

    TagStore::clear_person_tags(pool, photo_id).await?;
    let tag = TagStore::ensure_tag(pool, &tag_name).await?;
    TagStore::add_photo_tag(pool, photo_id, &tag.id, confidence, PhotoTagSource::AutoPeople).await?;

    Ok(tag_name)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Clears `owner`'s existing person clusters and reruns incremental
/// assignment over every embedded photo in upload order, committing as it
/// goes rather than holding one giant transaction (spec.md §4.10, last
/// paragraph).
pub async fn reindex(
    pool: &PgPool,
    owner: &str,
    candidates_limit: i64,
    threshold: f32,
) -> Result<u64> {
    TagStore::clear_owner_person_cluster_tags(pool, owner).await?;

    let photos = PhotoStore::list_embedded_for_reindex(pool, owner).await?;
    let mut reassigned: u64 = 0;

    for (i, photo) in photos.iter().enumerate() {
        let Some(embedding) = &photo.embedding else {
            continue;
        };
        assign_cluster(pool, owner, &photo.id, embedding, candidates_limit, threshold).await?;
        reassigned += 1;

        if (i + 1) % REINDEX_COMMIT_EVERY == 0 {
            tracing::info!(owner, reassigned, "people clusterer reindex progress");
        }
    }

    tracing::info!(owner, reassigned, "people clusterer reindex complete");
    Ok(reassigned)
}

/// Runs `reindex` for every owner with at least one photo, used by the
/// operator-triggered full recompute (spec.md §4.10, supplemented from
/// the original's `people.py` recompute entrypoint).
pub async fn full_reset(pool: &PgPool, candidates_limit: i64, threshold: f32) -> Result<u64> {
    let owners = photo_repository::MemoryStore::list_owners_with_photos(pool).await?;
    let mut total = 0u64;
    for owner in owners {
        total += reindex(pool, &owner, candidates_limit, threshold).await?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_yields_zero_similarity_without_panicking() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
