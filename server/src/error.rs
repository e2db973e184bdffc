use axum::http::StatusCode;
use thiserror::Error;

/// Failures from the SQLite-backed message store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection mutex was poisoned by a panicking holder.
    #[error("database lock poisoned")]
    Lock,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    /// The blocking task running the query was cancelled or panicked.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StoreError> for StatusCode {
    fn from(_: StoreError) -> Self {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
