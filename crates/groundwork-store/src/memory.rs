//! In-process index over a small corpus, implementing both retrieval
//! traits. Used by tests and the CLI corpus loader; production deployments
//! wire the real stores in instead.

use async_trait::async_trait;
use groundwork_core::{EvidenceKind, SourceRef};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{FulltextIndex, SearchRow, StoreError, VectorIndex};

/// Excerpts are truncated to this many characters.
const EXCERPT_CHARS: usize = 200;

/// One corpus document held in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDoc {
    pub key: String,
    #[serde(flatten)]
    pub source: SourceRef,
    pub text: String,
    /// Present only when the corpus ships precomputed embeddings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Token-overlap full-text scoring and cosine vector scoring over an
/// in-memory document list.
pub struct MemoryIndex {
    docs: Vec<MemoryDoc>,
}

impl MemoryIndex {
    pub fn new(docs: Vec<MemoryDoc>) -> Self {
        info!(docs = docs.len(), "memory index loaded");
        MemoryIndex { docs }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn row(doc: &MemoryDoc, raw_score: f64) -> SearchRow {
        SearchRow {
            key: doc.key.clone(),
            source: doc.source.clone(),
            excerpt: doc.text.chars().take(EXCERPT_CHARS).collect(),
            raw_score,
        }
    }
}

#[async_trait]
impl FulltextIndex for MemoryIndex {
    async fn search(
        &self,
        query: &str,
        kind: EvidenceKind,
        limit: usize,
    ) -> Result<Vec<SearchRow>, StoreError> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchRow> = self
            .docs
            .iter()
            .filter(|doc| doc.source.kind() == kind)
            .filter_map(|doc| {
                let text = doc.text.to_lowercase();
                let matched = tokens.iter().filter(|t| text.contains(t.as_str())).count();
                if matched == 0 {
                    return None;
                }
                Some(Self::row(doc, matched as f64))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.raw_score
                .total_cmp(&a.raw_score)
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        embedding: &[f32],
        kind: EvidenceKind,
        limit: usize,
    ) -> Result<Vec<SearchRow>, StoreError> {
        let mut hits: Vec<SearchRow> = self
            .docs
            .iter()
            .filter(|doc| doc.source.kind() == kind)
            .filter_map(|doc| {
                let doc_embedding = doc.embedding.as_ref()?;
                let score = cosine(embedding, doc_embedding);
                if score <= 0.0 {
                    return None;
                }
                Some(Self::row(doc, score))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.raw_score
                .total_cmp(&a.raw_score)
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}
