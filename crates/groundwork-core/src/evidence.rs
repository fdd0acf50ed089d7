//! Evidence items: one retrieved excerpt (engineering standard or legal
//! provision) with a normalised relevance score.
//!
//! Items are created per query, held only in memory or a process-local
//! cache, and never persisted.

use serde::{Deserialize, Serialize};

/// Which corpus an evidence item was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Standard,
    Law,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Standard => "standard",
            EvidenceKind::Law => "law",
        }
    }
}

/// Which retrieval path produced an item.
///
/// An item found by both the full-text and vector sub-searches is tagged
/// `Hybrid` by the ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retrieval {
    Fulltext,
    Vector,
    Hybrid,
}

/// Kind-specific source identification for an evidence item.
///
/// Downstream code pattern-matches on the variant rather than probing
/// optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    /// An engineering standard excerpt, identified by document title and
    /// clause path (e.g. "KCS 21 30 00 / 3.2.1").
    Standard { title: String, path: String },
    /// A legal provision excerpt, identified by statute name and
    /// article/paragraph/item numbering.
    Law {
        law_name: String,
        article_no: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        paragraph_no: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        item_no: Option<String>,
    },
}

impl SourceRef {
    pub fn kind(&self) -> EvidenceKind {
        match self {
            SourceRef::Standard { .. } => EvidenceKind::Standard,
            SourceRef::Law { .. } => EvidenceKind::Law,
        }
    }

    /// The label used for source-diversity counting: one label per
    /// distinct document or statute.
    pub fn label(&self) -> &str {
        match self {
            SourceRef::Standard { title, .. } => title,
            SourceRef::Law { law_name, .. } => law_name,
        }
    }
}

/// One retrieved unit of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Stable identifier within the corpus.
    pub key: String,
    #[serde(flatten)]
    pub source: SourceRef,
    /// Truncated text of the matched clause or provision.
    pub excerpt: String,
    pub retrieval: Retrieval,
    /// Raw relevance score as reported by the retrieval path.
    pub raw_score: f64,
    /// Score normalised to [0, 1] relative to the best item in the same
    /// result set. Zero until [`attach_evidence_scores`] runs.
    #[serde(default)]
    pub evidence_score: f64,
}

impl EvidenceItem {
    pub fn kind(&self) -> EvidenceKind {
        self.source.kind()
    }

    /// Lowercased blob of excerpt plus source identifiers, fed to the
    /// polarity and threshold heuristics.
    pub fn search_text(&self) -> String {
        let mut blob = String::with_capacity(self.excerpt.len() + 64);
        blob.push_str(&self.excerpt);
        blob.push(' ');
        match &self.source {
            SourceRef::Standard { title, path } => {
                blob.push_str(title);
                blob.push(' ');
                blob.push_str(path);
            }
            SourceRef::Law {
                law_name,
                article_no,
                paragraph_no,
                item_no,
            } => {
                blob.push_str(law_name);
                blob.push(' ');
                blob.push_str(article_no);
                if let Some(p) = paragraph_no {
                    blob.push(' ');
                    blob.push_str(p);
                }
                if let Some(i) = item_no {
                    blob.push(' ');
                    blob.push_str(i);
                }
            }
        }
        blob.to_lowercase()
    }
}

/// Normalise a result set's raw scores into comparable `[0, 1]`
/// evidence scores.
///
/// The divisor is the maximum raw score in the set, or `1.0` when the set
/// is empty or all-zero, so the best item always scores exactly `1.0` and
/// re-running on an already-scored list changes nothing.
pub fn attach_evidence_scores(items: &mut [EvidenceItem]) {
    let max = items.iter().map(|i| i.raw_score).fold(0.0_f64, f64::max);
    let divisor = if max > 0.0 { max } else { 1.0 };
    for item in items.iter_mut() {
        item.evidence_score = round4((item.raw_score / divisor).clamp(0.0, 1.0));
    }
}

/// Round to 4 decimal places.
pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
