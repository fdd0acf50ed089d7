use groundwork_ai::AiError;
use groundwork_store::StoreError;
use thiserror::Error;

/// Failure taxonomy of the public operations.
///
/// Local, per-item recoverable errors are swallowed into structured error
/// lists by the batch path; the systemic conditions below are surfaced
/// whole. Nothing escapes a public operation except this type.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Client error: invalid mode, out-of-range collection size, or
    /// non-positive duration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The retrieval backend is unreachable. Not retried here; retry
    /// policy belongs to the caller.
    #[error("retrieval unavailable: {0}")]
    Unavailable(#[from] StoreError),

    /// The caller requested vector-only mode and the embedding capability
    /// failed, so there is nothing to degrade to.
    #[error("vector search unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Generation capability not configured. Never retried, never cached.
    #[error("generation disabled: {0}")]
    Disabled(String),

    #[error("generation failed: {0}")]
    Generation(String),
}

impl From<AiError> for ServiceError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Disabled(reason) => ServiceError::Disabled(reason),
            other => ServiceError::Generation(other.to_string()),
        }
    }
}
