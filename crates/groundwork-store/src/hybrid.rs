//! Hybrid rank fusion of the full-text and vector result sets.
//!
//! Each source's raw scores are normalised by that source's own maximum so
//! the two rankings are comparable, then combined:
//!
//! ```text
//! score = (1 - alpha) * fulltext_norm + alpha * vector_norm
//! ```
//!
//! An item present in only one source keeps only that source's term; an
//! item present in both is tagged `hybrid`. The merge is commutative with
//! respect to sub-search completion order.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use groundwork_core::{EvidenceItem, Retrieval};
use tracing::debug;

use crate::SearchRow;

/// Default fusion weight; vector-leaning.
pub const DEFAULT_ALPHA: f64 = 0.6;

struct MergeSlot {
    row: SearchRow,
    fulltext: Option<f64>,
    vector: Option<f64>,
}

/// Merge the two result sets into one ranked, deduplicated evidence list.
///
/// Sorting is descending by combined score with ties broken by item key so
/// the ordering is deterministic across runs.
pub fn merge(
    fulltext: Vec<SearchRow>,
    vector: Vec<SearchRow>,
    limit: usize,
    alpha: f64,
) -> Vec<EvidenceItem> {
    let ft_max = max_score(&fulltext);
    let vec_max = max_score(&vector);

    let mut slots: HashMap<String, MergeSlot> = HashMap::new();
    for row in fulltext {
        let normalized = row.raw_score / ft_max;
        match slots.entry(row.key.clone()) {
            Entry::Occupied(mut slot) => slot.get_mut().fulltext = Some(normalized),
            Entry::Vacant(slot) => {
                slot.insert(MergeSlot {
                    row,
                    fulltext: Some(normalized),
                    vector: None,
                });
            }
        }
    }
    for row in vector {
        let normalized = row.raw_score / vec_max;
        match slots.entry(row.key.clone()) {
            Entry::Occupied(mut slot) => slot.get_mut().vector = Some(normalized),
            Entry::Vacant(slot) => {
                slot.insert(MergeSlot {
                    row,
                    fulltext: None,
                    vector: Some(normalized),
                });
            }
        }
    }

    let mut merged: Vec<EvidenceItem> = slots
        .into_iter()
        .map(|(key, slot)| {
            let (score, retrieval) = match (slot.fulltext, slot.vector) {
                (Some(ft), Some(v)) => ((1.0 - alpha) * ft + alpha * v, Retrieval::Hybrid),
                (Some(ft), None) => ((1.0 - alpha) * ft, Retrieval::Fulltext),
                // A slot is only created from one of the two loops above.
                _ => (alpha * slot.vector.unwrap_or(0.0), Retrieval::Vector),
            };
            EvidenceItem {
                key,
                source: slot.row.source,
                excerpt: slot.row.excerpt,
                retrieval,
                raw_score: score,
                evidence_score: 0.0,
            }
        })
        .collect();

    merged.sort_by(|a, b| {
        b.raw_score
            .total_cmp(&a.raw_score)
            .then_with(|| a.key.cmp(&b.key))
    });
    merged.truncate(limit);

    debug!(merged = merged.len(), alpha, "hybrid merge complete");
    merged
}

/// A source's own maximum, or 1.0 for an empty/all-zero set so the
/// normalisation divide is always defined.
fn max_score(rows: &[SearchRow]) -> f64 {
    let max = rows.iter().map(|r| r.raw_score).fold(0.0_f64, f64::max);
    if max > 0.0 { max } else { 1.0 }
}
