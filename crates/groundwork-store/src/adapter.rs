//! Pluggable retrieval primitives.
//!
//! The knowledge base is reachable only through these two traits; the
//! concrete graph/vector stores are wired in by the hosting process.

use async_trait::async_trait;
use groundwork_core::{EvidenceKind, SourceRef};

use crate::StoreError;

/// One ranked row from either retrieval path, before rank fusion.
#[derive(Debug, Clone)]
pub struct SearchRow {
    pub key: String,
    pub source: SourceRef,
    pub excerpt: String,
    pub raw_score: f64,
}

/// Full-text search over one corpus kind.
#[async_trait]
pub trait FulltextIndex: Send + Sync {
    /// `query` is already sanitized; rows come back ranked by the
    /// backend's own relevance score.
    async fn search(
        &self,
        query: &str,
        kind: EvidenceKind,
        limit: usize,
    ) -> Result<Vec<SearchRow>, StoreError>;
}

/// Vector similarity search over one corpus kind.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        embedding: &[f32],
        kind: EvidenceKind,
        limit: usize,
    ) -> Result<Vec<SearchRow>, StoreError>;
}
