use common_types::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Opens a bounded connection pool, mirroring
/// `common_services::database::get_db_pool` in the teacher.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| common_types::Error::Internal(e.to_string()))?;
    Ok(pool)
}

/// Runs the embedded `migrations/` directory against `pool`. Replaces the
/// teacher's sea-orm migration crate (see DESIGN.md).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| common_types::Error::Internal(e.to_string()))?;
    Ok(())
}
