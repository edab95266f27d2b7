/// Failures crossing the storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("already exists")]
    Conflict,
    #[error("not found")]
    NotFound,
    #[error("invalid credentials")]
    BadCredentials,
    #[error("storage backend: {0}")]
    Backend(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Backend(e.to_string())
    }
}
