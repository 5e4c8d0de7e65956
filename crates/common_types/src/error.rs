use thiserror::Error;

/// Error taxonomy shared by every library crate in the ingestion pipeline.
///
/// Binaries translate these into their own presentation (HTTP status,
/// log line, job retry decision); the library crates never swallow an
/// error into a bare `bool` or `Option` except where the spec explicitly
/// calls for counting (see `ingest`'s per-entry skip/fail handling).
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("claimed content type does not match file contents: {0}")]
    MagicMismatch(String),

    #[error("archive is malformed or unsupported: {0}")]
    ArchiveInvalid(String),

    #[error("duplicate source: {0}")]
    DuplicateSource(String),

    #[error("object storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("embedding request failed: {0}")]
    EmbedFailed(String),

    #[error("search is unavailable: {0}")]
    SearchUnavailable(String),

    #[error("source authorization was revoked")]
    SourceAuthRevoked,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::DuplicateSource(db_err.message().to_string())
            }
            _ => Error::Internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
