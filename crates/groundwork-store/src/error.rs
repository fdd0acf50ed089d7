use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The search backend could not be reached. Retry policy belongs to
    /// the caller; nothing here retries.
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}
