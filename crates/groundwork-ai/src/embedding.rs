//! Query embedding via an external HTTP capability.
//!
//! Embedding failures are expected to degrade the caller's search mode to
//! fulltext-only rather than fail the query, so the error type carries
//! enough context for the warning surfaced to the client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::AiError;

/// Turns a query string into a fixed-length numeric vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;
}

/// OpenAI-compatible `/embeddings` client.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// `base_url` should be like `https://api.openai.com/v1` (no trailing
    /// slash).
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        HttpEmbedder {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        if self.api_key.is_empty() {
            return Err(AiError::Disabled("openai_api_key is not set".into()));
        }

        let url = format!("{}/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": text }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = resp.json().await?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| AiError::Generation("embedding response carried no vector".into()))?;

        info!(dim = vector.len(), "query embedded");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_disabled_not_http() {
        let embedder = HttpEmbedder::new(
            "https://api.openai.com/v1".into(),
            String::new(),
            "text-embedding-3-small".into(),
        );
        let err = embedder.embed("비계 기준").await.unwrap_err();
        assert!(matches!(err, AiError::Disabled(_)), "got {err:?}");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let embedder = HttpEmbedder::new("http://localhost:8080/".into(), "k".into(), "m".into());
        assert_eq!(embedder.base_url, "http://localhost:8080");
    }
}
