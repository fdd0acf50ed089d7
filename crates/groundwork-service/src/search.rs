//! The retrieval/trust path: sanitize, sub-search, fuse, score, assess.
//!
//! Concurrent queries are independent; the only shared mutable state is
//! the per-concern caches. A cache miss under concurrency may recompute
//! the same query twice — accepted, since recomputation is idempotent.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use groundwork_ai::{Embedder, Generator};
use groundwork_core::{EvidenceItem, EvidenceKind, TrustRecord, attach_evidence_scores, build_trust_layer};
use groundwork_jobs::{JobManager, JobRecord};
use groundwork_store::{FulltextIndex, SearchRow, TtlLruCache, VectorIndex, merge, sanitize};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::enrich::EvidencePack;
use crate::{AgentAdvice, Card, ServiceError};

/// Upper bound on `limit` for plain search.
const SEARCH_LIMIT_MAX: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Hybrid,
    Fulltext,
    Vector,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Hybrid => "hybrid",
            SearchMode::Fulltext => "fulltext",
            SearchMode::Vector => "vector",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hybrid" => Ok(SearchMode::Hybrid),
            "fulltext" => Ok(SearchMode::Fulltext),
            "vector" => Ok(SearchMode::Vector),
            other => Err(ServiceError::InvalidInput(format!(
                "unknown search mode: {other}"
            ))),
        }
    }
}

/// Hit/miss and the mode that actually ran (degraded when embedding was
/// unavailable).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheMeta {
    pub hit: bool,
    pub effective_mode: SearchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub standards: Vec<EvidenceItem>,
    pub laws: Vec<EvidenceItem>,
    pub trust: TrustRecord,
    pub cache_meta: CacheMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub(crate) struct Caches {
    pub(crate) search: TtlLruCache<SearchResponse>,
    pub(crate) answer: TtlLruCache<String>,
    pub(crate) card: TtlLruCache<Card>,
    pub(crate) evidence: TtlLruCache<EvidencePack>,
    pub(crate) duration: TtlLruCache<AgentAdvice>,
}

/// The grounded-retrieval core. Construct once at process start and share;
/// the caches and job ledger are injected here rather than living as
/// ambient singletons.
pub struct Service {
    pub(crate) fulltext: Arc<dyn FulltextIndex>,
    pub(crate) vector: Arc<dyn VectorIndex>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) generator: Arc<dyn Generator>,
    pub(crate) caches: Caches,
    pub(crate) jobs: JobManager,
    pub(crate) config: ServiceConfig,
}

impl Service {
    pub fn new(
        config: ServiceConfig,
        fulltext: Arc<dyn FulltextIndex>,
        vector: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let caches = Caches {
            search: TtlLruCache::new(config.search_cache.ttl, config.search_cache.max_size),
            answer: TtlLruCache::new(config.answer_cache.ttl, config.answer_cache.max_size),
            card: TtlLruCache::new(config.card_cache.ttl, config.card_cache.max_size),
            evidence: TtlLruCache::new(config.evidence_cache.ttl, config.evidence_cache.max_size),
            duration: TtlLruCache::new(config.duration_cache.ttl, config.duration_cache.max_size),
        };
        let jobs = JobManager::new(config.jobs);
        Service {
            fulltext,
            vector,
            embedder,
            generator,
            caches,
            jobs,
            config,
        }
    }

    /// Ranked evidence plus trust assessment for one query.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        mode: SearchMode,
    ) -> Result<SearchResponse, ServiceError> {
        let limit = limit.clamp(1, SEARCH_LIMIT_MAX);
        let clean = sanitize(query);
        if clean.is_empty() {
            // Nothing searchable: answer without touching the store.
            return Ok(SearchResponse {
                standards: Vec::new(),
                laws: Vec::new(),
                trust: build_trust_layer(query, &[], &[]),
                cache_meta: CacheMeta {
                    hit: false,
                    effective_mode: mode,
                },
                warning: Some("query empty after sanitization".into()),
            });
        }

        let cache_key = format!("{mode}:{limit}:{clean}");
        if let Some(mut cached) = self.caches.search.get(&cache_key) {
            cached.cache_meta.hit = true;
            return Ok(cached);
        }

        let (effective_mode, embedding, warning) = self.resolve_mode(mode, &clean).await?;

        let (standards, laws) = futures::try_join!(
            self.search_kind(&clean, embedding.as_deref(), EvidenceKind::Standard, limit, effective_mode),
            self.search_kind(&clean, embedding.as_deref(), EvidenceKind::Law, limit, effective_mode),
        )?;

        let trust = build_trust_layer(&clean, &standards, &laws);
        info!(
            query = %clean,
            mode = %effective_mode,
            standards = standards.len(),
            laws = laws.len(),
            confidence = trust.overall_confidence,
            "search complete"
        );

        let response = SearchResponse {
            standards,
            laws,
            trust,
            cache_meta: CacheMeta {
                hit: false,
                effective_mode,
            },
            warning,
        };
        self.caches.search.set(&cache_key, response.clone());
        Ok(response)
    }

    /// Snapshot a job record; `None` when unknown or already pruned.
    pub fn job_status(&self, job_id: &str, include_result: bool) -> Option<JobRecord> {
        self.jobs.job(job_id, include_result)
    }

    /// Decide the mode that will actually run. Hybrid/vector need an
    /// embedding; when the provider fails, hybrid degrades to fulltext
    /// with a warning while vector-only is a hard failure.
    async fn resolve_mode(
        &self,
        requested: SearchMode,
        query: &str,
    ) -> Result<(SearchMode, Option<Vec<f32>>, Option<String>), ServiceError> {
        if requested == SearchMode::Fulltext {
            return Ok((SearchMode::Fulltext, None, None));
        }
        match self.embedder.embed(query).await {
            Ok(embedding) => Ok((requested, Some(embedding), None)),
            Err(err) if requested == SearchMode::Vector => {
                Err(ServiceError::EmbeddingUnavailable(err.to_string()))
            }
            Err(err) => {
                warn!(error = %err, "embedding unavailable; degrading to fulltext");
                Ok((
                    SearchMode::Fulltext,
                    None,
                    Some(format!("embedding unavailable, degraded to fulltext: {err}")),
                ))
            }
        }
    }

    /// One corpus kind through the effective mode's sub-searches and rank
    /// fusion, with evidence scores attached.
    async fn search_kind(
        &self,
        query: &str,
        embedding: Option<&[f32]>,
        kind: EvidenceKind,
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<EvidenceItem>, ServiceError> {
        let (fulltext_rows, vector_rows): (Vec<SearchRow>, Vec<SearchRow>) = match mode {
            SearchMode::Fulltext => (self.fulltext.search(query, kind, limit).await?, Vec::new()),
            SearchMode::Vector => {
                let embedding = embedding.unwrap_or_default();
                (Vec::new(), self.vector.search(embedding, kind, limit).await?)
            }
            SearchMode::Hybrid => {
                let embedding = embedding.unwrap_or_default();
                futures::try_join!(
                    self.fulltext.search(query, kind, limit),
                    self.vector.search(embedding, kind, limit),
                )?
            }
        };

        let mut items = merge(fulltext_rows, vector_rows, limit, self.config.alpha);
        attach_evidence_scores(&mut items);
        Ok(items)
    }
}
