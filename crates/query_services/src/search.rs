//! C11 — Search Planner: free-text query -> embedding -> `probes`-tuned
//! vector search -> paginated hits.

use clients::EmbedderClient;
use common_types::{Error, Result, SearchResult};
use photo_repository::PhotoStore;
use sqlx::PgPool;

pub struct SearchParams<'a> {
    pub owner: &'a str,
    pub query_text: &'a str,
    pub limit: i64,
    pub offset: i64,
    pub probes: u32,
}

/// Embeds `query_text` and runs the cosine search inside a transaction so
/// `SET LOCAL ivfflat.probes` scopes to this query only. Fetches
/// `limit + 1` rows so `has_more`/`next_offset` can be derived without a
/// separate count query (spec.md §4.11 steps 1-4).
pub async fn search(
    pool: &PgPool,
    embedder: &dyn EmbedderClient,
    params: SearchParams<'_>,
) -> Result<SearchResult> {
    let query_vector = embedder
        .embed_text(params.query_text)
        .await
        .map_err(|e| Error::SearchUnavailable(e.to_string()))?;

    let mut tx = pool.begin().await.map_err(common_types::Error::from)?;
    let mut hits = PhotoStore::search(
        &mut tx,
        params.owner,
        &query_vector,
        params.limit + 1,
        params.offset,
        params.probes,
    )
    .await?;
    tx.commit().await.map_err(common_types::Error::from)?;

    let has_more = hits.len() as i64 > params.limit;
    if has_more {
        hits.truncate(usize::try_from(params.limit).unwrap_or(0));
    }
    let next_offset = has_more.then_some(params.offset + params.limit);

    Ok(SearchResult { items: hits, has_more, next_offset })
}
