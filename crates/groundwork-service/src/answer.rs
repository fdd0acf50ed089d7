//! Generated answers and execution cards on top of the retrieval path.
//!
//! Generation is delegated to the external capability; this module only
//! assembles prompts, screens in-band failures, and shapes the result.
//! Failures are never cached, so a transient outage is not frozen into
//! the TTL window.

use groundwork_ai::{answer_prompt, card_prompt, is_failure_marker, shape_card};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{SearchMode, SearchResponse, Service, ServiceError};

pub use groundwork_ai::Card;

/// Upper bound on `limit` for generation-backed operations.
const GENERATE_LIMIT_MAX: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(flatten)]
    pub search: SearchResponse,
    pub answer: String,
    pub answer_cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResponse {
    #[serde(flatten)]
    pub search: SearchResponse,
    pub card: Card,
    pub card_cached: bool,
}

impl Service {
    /// Evidence-grounded natural-language answer.
    pub async fn answer(
        &self,
        query: &str,
        limit: usize,
        mode: SearchMode,
    ) -> Result<AnswerResponse, ServiceError> {
        let limit = limit.clamp(1, GENERATE_LIMIT_MAX);
        let search = self.search(query, limit, mode).await?;

        let cache_key = format!("{mode}:{limit}:{query}");
        if let Some(answer) = self.caches.answer.get(&cache_key) {
            return Ok(AnswerResponse {
                search,
                answer,
                answer_cached: true,
            });
        }

        let prompt = answer_prompt(query, &search.standards, &search.laws);
        let answer = self.generator.generate(&prompt).await?;
        if is_failure_marker(&answer) {
            return Err(ServiceError::Generation(answer));
        }

        self.caches.answer.set(&cache_key, answer.clone());
        info!(query, chars = answer.len(), "answer generated");
        Ok(AnswerResponse {
            search,
            answer,
            answer_cached: false,
        })
    }

    /// Evidence-grounded execution checklist card.
    pub async fn card(
        &self,
        query: &str,
        limit: usize,
        mode: SearchMode,
    ) -> Result<CardResponse, ServiceError> {
        let limit = limit.clamp(1, GENERATE_LIMIT_MAX);
        let search = self.search(query, limit, mode).await?;

        let cache_key = format!("{mode}:{limit}:{query}");
        if let Some(card) = self.caches.card.get(&cache_key) {
            return Ok(CardResponse {
                search,
                card,
                card_cached: true,
            });
        }

        let prompt = card_prompt(query, &search.standards, &search.laws);
        let raw = self.generator.generate(&prompt).await?;
        if is_failure_marker(&raw) {
            return Err(ServiceError::Generation(raw));
        }
        let card = shape_card(&raw)?;

        self.caches.card.set(&cache_key, card.clone());
        info!(query, checklist = card.checklist.len(), "card generated");
        Ok(CardResponse {
            search,
            card,
            card_cached: false,
        })
    }
}
