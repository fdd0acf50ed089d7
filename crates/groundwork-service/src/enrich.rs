//! Batch enrichment and evidence-pack assembly.
//!
//! One bad item never aborts a batch: per-item failures are collected
//! into `errors[]` and the unenriched item passes through unchanged.
//! Systemic conditions (store unreachable, credential missing) abort the
//! whole call instead of being repeated once per item.

use std::sync::Arc;

use groundwork_core::{EvidenceItem, SourceRef, TrustRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{Card, SearchMode, Service, ServiceError};

/// Hard bound on batch size; larger requests are client errors.
const BATCH_ITEMS_MAX: usize = 1000;
/// Most items actually enriched per call; the rest pass through.
const ENRICH_ITEMS_MAX: usize = 50;
const ENRICH_LIMIT_MAX: usize = 20;
const PACK_EVIDENCE_PER_KIND_MAX: usize = 20;
const PACK_EXCERPT_MAX: usize = 2000;
/// Per-item failure reasons are truncated like job errors.
const ITEM_ERROR_CHARS: usize = 240;

/// One work item submitted for enrichment. Unknown fields round-trip
/// untouched so the caller's payload survives the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    /// Query text used to ground this item.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    pub standards: Vec<EvidenceItem>,
    pub laws: Vec<EvidenceItem>,
    pub trust: TrustRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichRequest {
    pub items: Vec<BatchItem>,
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Re-enrich items that already carry an enrichment.
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub include_answer: bool,
    #[serde(default)]
    pub include_card: bool,
    /// Accept the batch and run it on the job pool instead of inline.
    #[serde(default, rename = "async")]
    pub run_async: bool,
}

fn default_mode() -> SearchMode {
    SearchMode::Hybrid
}
fn default_limit() -> usize {
    10
}
fn default_max_items() -> usize {
    ENRICH_ITEMS_MAX
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichResponse {
    pub items: Vec<BatchItem>,
    pub errors: Vec<BatchError>,
    pub enriched_count: usize,
}

/// 202-style acceptance for an async batch.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichAccepted {
    pub job_id: String,
    pub status: groundwork_jobs::JobStatus,
    pub status_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EnrichOutcome {
    Inline(EnrichResponse),
    Accepted(EnrichAccepted),
}

// ── Evidence pack ──

/// One subject to collect evidence for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackSubject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackEntry {
    pub id: String,
    pub name: String,
    pub standard_refs: Vec<String>,
    pub law_refs: Vec<String>,
    pub trust: TrustRecord,
}

/// Markdown digest plus the deduplicated evidence it cites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePack {
    pub markdown: String,
    pub items: Vec<PackEntry>,
    pub evidence_index: Vec<EvidenceItem>,
}

impl Service {
    /// Enrich a batch of work items with grounded evidence, inline or via
    /// the job pool.
    pub async fn enrich_batch(
        self: &Arc<Self>,
        request: EnrichRequest,
    ) -> Result<EnrichOutcome, ServiceError> {
        if request.items.len() > BATCH_ITEMS_MAX {
            return Err(ServiceError::InvalidInput(format!(
                "batch of {} exceeds {BATCH_ITEMS_MAX} items",
                request.items.len()
            )));
        }

        if !request.run_async {
            return Ok(EnrichOutcome::Inline(self.enrich_inline(request).await?));
        }

        let service = Arc::clone(self);
        let ticket = self.jobs.submit(async move {
            let response = service
                .enrich_inline(request)
                .await
                .map_err(|e| e.to_string())?;
            serde_json::to_value(&response).map_err(|e| e.to_string())
        });
        info!(job_id = %ticket.job_id, "batch enrichment accepted");
        Ok(EnrichOutcome::Accepted(EnrichAccepted {
            status_url: format!("/api/jobs/{}", ticket.job_id),
            job_id: ticket.job_id,
            status: ticket.status,
        }))
    }

    async fn enrich_inline(&self, request: EnrichRequest) -> Result<EnrichResponse, ServiceError> {
        let limit = request.limit.clamp(1, ENRICH_LIMIT_MAX);
        let max_items = request.max_items.clamp(1, ENRICH_ITEMS_MAX);

        let mut items = request.items;
        let mut errors = Vec::new();
        let mut enriched_count = 0_usize;

        for item in items.iter_mut().take(max_items) {
            if item.enrichment.is_some() && !request.overwrite {
                continue;
            }
            match self
                .enrich_one(item, limit, request.mode, request.include_answer, request.include_card)
                .await
            {
                Ok(enrichment) => {
                    item.enrichment = Some(enrichment);
                    enriched_count += 1;
                }
                // Systemic conditions abort the batch whole.
                Err(err @ (ServiceError::Unavailable(_) | ServiceError::Disabled(_))) => {
                    return Err(err);
                }
                Err(err) => errors.push(BatchError {
                    id: item.id.clone(),
                    reason: err.to_string().chars().take(ITEM_ERROR_CHARS).collect(),
                }),
            }
        }

        info!(
            total = items.len(),
            enriched = enriched_count,
            failed = errors.len(),
            "batch enrichment finished"
        );
        Ok(EnrichResponse {
            items,
            errors,
            enriched_count,
        })
    }

    async fn enrich_one(
        &self,
        item: &BatchItem,
        limit: usize,
        mode: SearchMode,
        include_answer: bool,
        include_card: bool,
    ) -> Result<Enrichment, ServiceError> {
        let search = self.search(&item.name, limit, mode).await?;
        let answer = if include_answer {
            Some(self.answer(&item.name, limit, mode).await?.answer)
        } else {
            None
        };
        let card = if include_card {
            Some(self.card(&item.name, limit, mode).await?.card)
        } else {
            None
        };
        Ok(Enrichment {
            standards: search.standards,
            laws: search.laws,
            trust: search.trust,
            answer,
            card,
        })
    }

    /// Assemble a citable markdown evidence pack over a list of subjects.
    pub async fn evidence_pack(
        &self,
        subjects: Vec<PackSubject>,
        max_evidence_per_kind: usize,
        excerpt_limit: usize,
    ) -> Result<EvidencePack, ServiceError> {
        if subjects.len() > BATCH_ITEMS_MAX {
            return Err(ServiceError::InvalidInput(format!(
                "pack of {} exceeds {BATCH_ITEMS_MAX} subjects",
                subjects.len()
            )));
        }
        let per_kind = max_evidence_per_kind.clamp(1, PACK_EVIDENCE_PER_KIND_MAX);
        let excerpt_limit = excerpt_limit.clamp(1, PACK_EXCERPT_MAX);

        let cache_key = {
            let ids: Vec<&str> = subjects.iter().map(|s| s.name.as_str()).collect();
            format!("{per_kind}:{excerpt_limit}:{}", ids.join("\u{1f}"))
        };
        if let Some(cached) = self.caches.evidence.get(&cache_key) {
            return Ok(cached);
        }

        let mut markdown = String::from("# 근거 팩\n\n");
        let mut entries = Vec::with_capacity(subjects.len());
        let mut index: Vec<EvidenceItem> = Vec::new();

        for subject in &subjects {
            let search = self.search(&subject.name, per_kind, SearchMode::Hybrid).await?;
            markdown.push_str(&format!("## {} ({})\n", subject.name, subject.id));
            push_kind_section(&mut markdown, "설계기준·표준시방서", &search.standards, excerpt_limit);
            push_kind_section(&mut markdown, "법령", &search.laws, excerpt_limit);
            markdown.push('\n');

            for item in search.standards.iter().chain(search.laws.iter()) {
                if !index.iter().any(|existing| existing.key == item.key) {
                    index.push(item.clone());
                }
            }
            entries.push(PackEntry {
                id: subject.id.clone(),
                name: subject.name.clone(),
                standard_refs: search.standards.iter().map(|i| i.key.clone()).collect(),
                law_refs: search.laws.iter().map(|i| i.key.clone()).collect(),
                trust: search.trust,
            });
        }

        let pack = EvidencePack {
            markdown,
            items: entries,
            evidence_index: index,
        };
        self.caches.evidence.set(&cache_key, pack.clone());
        Ok(pack)
    }
}

fn push_kind_section(
    markdown: &mut String,
    heading: &str,
    items: &[EvidenceItem],
    excerpt_limit: usize,
) {
    if items.is_empty() {
        return;
    }
    markdown.push_str(&format!("### {heading}\n"));
    for item in items {
        let excerpt: String = item.excerpt.chars().take(excerpt_limit).collect();
        markdown.push_str(&format!(
            "- **[{}]** {} — {}\n",
            item.key,
            citation(&item.source),
            excerpt
        ));
    }
}

/// Human-readable citation for one source.
pub(crate) fn citation(source: &SourceRef) -> String {
    match source {
        SourceRef::Standard { title, path } => format!("{title} {path}"),
        SourceRef::Law {
            law_name,
            article_no,
            paragraph_no,
            item_no,
        } => {
            let mut c = format!("{law_name} {article_no}");
            if let Some(p) = paragraph_no {
                c.push(' ');
                c.push_str(p);
            }
            if let Some(i) = item_no {
                c.push(' ');
                c.push_str(i);
            }
            c
        }
    }
}
