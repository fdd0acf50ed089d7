use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    /// No credential/endpoint configured. Surfaced immediately, never
    /// retried, never cached as success.
    #[error("capability not configured: {0}")]
    Disabled(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend answered 2xx but the payload reads as a failure
    /// (in-band failure marker or an empty completion).
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("malformed card payload: {0}")]
    MalformedCard(String),
}
