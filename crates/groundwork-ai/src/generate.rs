//! Text-generation client and structured-result shaping.
//!
//! Some backends report their own failures in-band as ordinary completion
//! text; [`is_failure_marker`] screens for those so a failure string is
//! never cached or returned as an answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AiError;

/// Completion substrings that mean the backend failed even though the
/// HTTP exchange succeeded.
const FAILURE_MARKERS: &[&str] = &[
    "openai_api_key is not set",
    "temporarily unavailable",
    "rate limit exceeded",
];

/// Forwards an assembled prompt to the text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpGenerator {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        HttpGenerator {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        if self.api_key.is_empty() {
            return Err(AiError::Disabled("openai_api_key is not set".into()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
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

        let parsed: ChatResponse = resp.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AiError::Generation("empty completion".into()));
        }
        if is_failure_marker(&text) {
            return Err(AiError::Generation(text));
        }

        info!(chars = text.len(), "completion received");
        Ok(text)
    }
}

/// True when a completion text is one of the known in-band failures.
pub fn is_failure_marker(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FAILURE_MARKERS.iter().any(|m| lowered.contains(m))
}

// ── Card shaping ──

/// Execution checklist generated from evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub one_liner: String,
    pub checklist: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
}

/// Parse and validate a generated card payload.
///
/// Backends often wrap JSON in Markdown code fences; those are stripped
/// before parsing. A card without a one-liner or checklist is malformed.
pub fn shape_card(raw: &str) -> Result<Card, AiError> {
    let stripped = strip_fences(raw);
    let card: Card = serde_json::from_str(stripped)
        .map_err(|e| AiError::MalformedCard(format!("not valid card JSON: {e}")))?;
    if card.one_liner.trim().is_empty() {
        return Err(AiError::MalformedCard("one_liner is empty".into()));
    }
    if card.checklist.is_empty() {
        return Err(AiError::MalformedCard("checklist is empty".into()));
    }
    Ok(card)
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_markers_detected_case_insensitively() {
        assert!(is_failure_marker("OPENAI_API_KEY is not set"));
        assert!(is_failure_marker("service temporarily unavailable, retry later"));
        assert!(!is_failure_marker("비계 설치 시 작업발판 폭은 40cm 이상"));
    }

    #[test]
    fn card_parses_plain_json() {
        let raw = r#"{
            "one_liner": "흙막이 계측 관리",
            "checklist": ["계측기 설치", "초기치 확보"],
            "risks": ["변위 초과"],
            "required_documents": ["계측 계획서"]
        }"#;
        let card = shape_card(raw).unwrap();
        assert_eq!(card.one_liner, "흙막이 계측 관리");
        assert_eq!(card.checklist.len(), 2);
    }

    #[test]
    fn card_parses_fenced_json() {
        let raw = "```json\n{\"one_liner\": \"x\", \"checklist\": [\"a\"]}\n```";
        let card = shape_card(raw).unwrap();
        assert_eq!(card.one_liner, "x");
        assert!(card.risks.is_empty());
    }

    #[test]
    fn empty_checklist_is_malformed() {
        let raw = r#"{"one_liner": "x", "checklist": []}"#;
        let err = shape_card(raw).unwrap_err();
        assert!(matches!(err, AiError::MalformedCard(_)), "got {err:?}");
    }

    #[test]
    fn prose_is_malformed() {
        let err = shape_card("here is your checklist: ...").unwrap_err();
        assert!(matches!(err, AiError::MalformedCard(_)));
    }

    #[tokio::test]
    async fn missing_key_is_disabled() {
        let generator =
            HttpGenerator::new("http://localhost:1".into(), String::new(), "gpt-4o-mini".into());
        let err = generator.generate("p").await.unwrap_err();
        assert!(matches!(err, AiError::Disabled(_)));
    }
}
