//! Trust and conflict analysis over a scored evidence set.
//!
//! Detects *textual* contradictions only: directive polarity (mandatory vs
//! prohibitive cue tokens) and same-unit numeric threshold clashes. The cue
//! lists are intentionally language-mixed (Korean/English) to match the
//! corpus. This is a heuristic layer, not a theorem prover.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::evidence::{EvidenceItem, round4};

/// Mandatory-directive cue tokens. "must not" is blanked out before this
/// list is scanned so it never fires the bare "must" cue.
const MANDATORY_CUES: &[&str] = &["must", "shall", "required", "이상", "반드시"];

/// Prohibitive-directive cue tokens.
const PROHIBITIVE_CUES: &[&str] = &["must not", "shall not", "prohibited", "금지"];

/// Cue tokens marking a numeric value as a lower bound.
const MIN_CUES: &[&str] = &["이상", "at least", "minimum"];

/// Cue tokens marking a numeric value as an upper bound.
const MAX_CUES: &[&str] = &["이하", "at most", "maximum"];

/// Window inspected around a number+unit match when classifying it,
/// measured in characters on both sides.
const CUE_WINDOW_CHARS: usize = 20;

/// Most conflicts surfaced on one trust record; the rest are truncated.
const MAX_CONFLICTS: usize = 6;

/// Most query tokens considered for the token-agreement signal.
const MAX_QUERY_TOKENS: usize = 12;

static THRESHOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Longest alternatives first so "mm" wins over "m" and "days" over "day".
    Regex::new(r"(\d+(?:\.\d+)?)\s*(%|mm|cm|m²|m³|m2|m3|kg|days|day|일|t|m)")
        .expect("threshold regex is valid")
});

/// Short connector words excluded from the query token set.
const STOP_TOKENS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "in", "on", "at", "to", "for", "is", "are", "be", "with",
    "by", "from", "about", "what", "when", "how", "which", "does", "do", "및", "등", "그", "수",
    "것", "이", "의", "를", "은", "는",
];

// ── Types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    DirectiveConflict,
    ThresholdConflict,
}

/// A detected contradiction between two or more evidence items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub reason: String,
    /// Keys of the implicated items; always at least two.
    pub evidence_refs: Vec<String>,
}

/// Aggregate confidence assessment over one query's evidence set.
///
/// Recomputed fresh on every query, never mutated in place. All scores are
/// in `[0, 1]`; an empty evidence set yields the all-zero record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRecord {
    /// Mean evidence score across the set.
    pub evidence_score: f64,
    pub source_consistency_score: f64,
    /// Unique source labels divided by item count.
    pub source_coverage: f64,
    pub overall_confidence: f64,
    pub conflicts: Vec<Conflict>,
}

impl TrustRecord {
    fn empty() -> Self {
        TrustRecord {
            evidence_score: 0.0,
            source_consistency_score: 0.0,
            source_coverage: 0.0,
            overall_confidence: 0.0,
            conflicts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Min,
    Max,
    Exact,
}

#[derive(Debug, Clone)]
struct ThresholdMention {
    value: f64,
    unit: String,
    bound: Bound,
}

/// Per-item derived signals, computed once per analysis pass.
struct ItemSignals {
    key: String,
    text: String,
    polarity: i8,
    thresholds: Vec<ThresholdMention>,
}

// ── Analysis ──

/// Build the trust record for one query over its standards and legal
/// provision evidence.
pub fn build_trust_layer(
    query: &str,
    standards: &[EvidenceItem],
    laws: &[EvidenceItem],
) -> TrustRecord {
    let items: Vec<&EvidenceItem> = standards.iter().chain(laws.iter()).collect();
    if items.is_empty() {
        return TrustRecord::empty();
    }

    let signals: Vec<ItemSignals> = items
        .iter()
        .map(|item| {
            let text = item.search_text();
            ItemSignals {
                key: item.key.clone(),
                polarity: detect_polarity(&text),
                thresholds: extract_thresholds(&text),
                text,
            }
        })
        .collect();

    let mut conflicts = Vec::new();
    if let Some(conflict) = directive_conflict(&signals) {
        conflicts.push(conflict);
    }
    conflicts.extend(threshold_conflicts(&signals));
    conflicts.truncate(MAX_CONFLICTS);

    let mean_evidence =
        items.iter().map(|i| i.evidence_score).sum::<f64>() / items.len() as f64;
    let source_coverage = source_coverage(&items);
    let token_agreement = token_agreement(query, &signals);
    let conflict_penalty = conflicts.len() as f64;

    let consistency = (0.45 * token_agreement + 0.25 * source_coverage + 0.30 * mean_evidence
        - (0.15 * conflict_penalty).min(0.45))
    .clamp(0.0, 1.0);
    let overall = (0.45 * mean_evidence + 0.40 * consistency + 0.15 * source_coverage
        - (0.10 * conflict_penalty).min(0.30))
    .clamp(0.0, 1.0);

    debug!(
        items = items.len(),
        conflicts = conflicts.len(),
        consistency,
        overall,
        "trust layer computed"
    );

    TrustRecord {
        evidence_score: round4(mean_evidence),
        source_consistency_score: round4(consistency),
        source_coverage: round4(source_coverage),
        overall_confidence: round4(overall),
        conflicts,
    }
}

/// Directive polarity of one evidence text: `+1` when only mandatory cues
/// fire, `-1` when only prohibitive cues fire, `0` when both or neither.
fn detect_polarity(text: &str) -> i8 {
    let prohibitive = PROHIBITIVE_CUES.iter().any(|cue| text.contains(cue));

    // Blank prohibitive phrases so "must not" does not count as "must".
    let mut stripped = text.to_string();
    for cue in PROHIBITIVE_CUES {
        if cue.contains(' ') {
            stripped = stripped.replace(cue, " ");
        }
    }
    let mandatory = MANDATORY_CUES.iter().any(|cue| stripped.contains(cue));

    match (mandatory, prohibitive) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    }
}

/// Extract `number + unit` mentions and classify each as a minimum, maximum
/// or exact value from cue tokens in a ±20-character window.
fn extract_thresholds(text: &str) -> Vec<ThresholdMention> {
    let mut found = Vec::new();
    for caps in THRESHOLD_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // Reject matches glued to a longer word, e.g. the "t" in "5tons".
        if text[whole.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        {
            continue;
        }
        let value: f64 = match caps[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let window = cue_window(text, whole.start(), whole.end());
        let is_min = MIN_CUES.iter().any(|cue| window.contains(cue));
        let is_max = MAX_CUES.iter().any(|cue| window.contains(cue));
        let bound = match (is_min, is_max) {
            (true, false) => Bound::Min,
            (false, true) => Bound::Max,
            _ => Bound::Exact,
        };
        found.push(ThresholdMention {
            value,
            unit: canonical_unit(&caps[2]),
            bound,
        });
    }
    found
}

/// Slice a ±`CUE_WINDOW_CHARS` window around `[start, end)`, widening on
/// character boundaries so multi-byte text never splits a codepoint.
fn cue_window(text: &str, start: usize, end: usize) -> &str {
    let w_start = text[..start]
        .char_indices()
        .rev()
        .nth(CUE_WINDOW_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let w_end = text[end..]
        .char_indices()
        .nth(CUE_WINDOW_CHARS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[w_start..w_end]
}

/// Fold ASCII spellings of area/volume units and day plurals together so
/// same-unit grouping sees one unit. No cross-unit conversion (cm is not
/// compared against mm).
fn canonical_unit(unit: &str) -> String {
    match unit {
        "m2" => "m²".to_string(),
        "m3" => "m³".to_string(),
        "days" | "일" => "day".to_string(),
        other => other.to_string(),
    }
}

/// One directive conflict when the set contains both polarities, citing up
/// to two items of each.
fn directive_conflict(signals: &[ItemSignals]) -> Option<Conflict> {
    let mandatory: Vec<&ItemSignals> = signals.iter().filter(|s| s.polarity == 1).collect();
    let prohibitive: Vec<&ItemSignals> = signals.iter().filter(|s| s.polarity == -1).collect();
    if mandatory.is_empty() || prohibitive.is_empty() {
        return None;
    }
    let mut refs: Vec<String> = mandatory.iter().take(2).map(|s| s.key.clone()).collect();
    refs.extend(prohibitive.iter().take(2).map(|s| s.key.clone()));
    Some(Conflict {
        conflict_type: ConflictType::DirectiveConflict,
        reason: format!(
            "{} item(s) read as mandatory while {} item(s) read as prohibitive",
            mandatory.len(),
            prohibitive.len()
        ),
        evidence_refs: refs,
    })
}

/// Per-unit threshold conflicts: a mandated floor above a mandated ceiling.
///
/// Units are compared literally; BTreeMap keeps the per-unit iteration
/// order stable across runs.
fn threshold_conflicts(signals: &[ItemSignals]) -> Vec<Conflict> {
    struct UnitBounds<'a> {
        max_min: Option<(f64, &'a str)>,
        min_max: Option<(f64, &'a str)>,
    }

    let mut by_unit: BTreeMap<&str, UnitBounds> = BTreeMap::new();
    for signal in signals {
        for mention in &signal.thresholds {
            let entry = by_unit.entry(mention.unit.as_str()).or_insert(UnitBounds {
                max_min: None,
                min_max: None,
            });
            match mention.bound {
                Bound::Min => {
                    if entry.max_min.is_none_or(|(v, _)| mention.value > v) {
                        entry.max_min = Some((mention.value, &signal.key));
                    }
                }
                Bound::Max => {
                    if entry.min_max.is_none_or(|(v, _)| mention.value < v) {
                        entry.min_max = Some((mention.value, &signal.key));
                    }
                }
                Bound::Exact => {}
            }
        }
    }

    let mut conflicts = Vec::new();
    for (unit, bounds) in by_unit {
        let (Some((floor, floor_key)), Some((ceiling, ceiling_key))) =
            (bounds.max_min, bounds.min_max)
        else {
            continue;
        };
        if floor > ceiling {
            conflicts.push(Conflict {
                conflict_type: ConflictType::ThresholdConflict,
                reason: format!(
                    "required minimum {floor}{unit} exceeds allowed maximum {ceiling}{unit}"
                ),
                evidence_refs: vec![floor_key.to_string(), ceiling_key.to_string()],
            });
        }
    }
    conflicts
}

/// Fraction of significant query tokens that appear in at least two
/// distinct evidence texts. Defaults to 0.5 when the query yields no
/// usable tokens.
fn token_agreement(query: &str, signals: &[ItemSignals]) -> f64 {
    let tokens = significant_tokens(query);
    if tokens.is_empty() {
        return 0.5;
    }
    let agreeing = tokens
        .iter()
        .filter(|token| {
            signals
                .iter()
                .filter(|s| s.text.contains(token.as_str()))
                .count()
                >= 2
        })
        .count();
    agreeing as f64 / tokens.len() as f64
}

/// Up to 12 lowercased query tokens, dropping one-character fragments and
/// common connector words.
fn significant_tokens(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut seen = HashSet::new();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_TOKENS.contains(t))
        .filter(|t| seen.insert(t.to_string()))
        .map(|t| t.to_string())
        .take(MAX_QUERY_TOKENS)
        .collect()
}

fn source_coverage(items: &[&EvidenceItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = items.iter().map(|i| i.source.label()).collect();
    unique.len() as f64 / items.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Retrieval, SourceRef, attach_evidence_scores};

    fn standard(key: &str, title: &str, excerpt: &str) -> EvidenceItem {
        EvidenceItem {
            key: key.to_string(),
            source: SourceRef::Standard {
                title: title.to_string(),
                path: "1.1".into(),
            },
            excerpt: excerpt.to_string(),
            retrieval: Retrieval::Fulltext,
            raw_score: 1.0,
            evidence_score: 1.0,
        }
    }

    fn law(key: &str, law_name: &str, excerpt: &str) -> EvidenceItem {
        EvidenceItem {
            key: key.to_string(),
            source: SourceRef::Law {
                law_name: law_name.to_string(),
                article_no: "제38조".into(),
                paragraph_no: None,
                item_no: None,
            },
            excerpt: excerpt.to_string(),
            retrieval: Retrieval::Fulltext,
            raw_score: 1.0,
            evidence_score: 1.0,
        }
    }

    #[test]
    fn empty_evidence_yields_zero_record() {
        let record = build_trust_layer("비계 설치 기준", &[], &[]);
        assert_eq!(record.evidence_score, 0.0);
        assert_eq!(record.source_consistency_score, 0.0);
        assert_eq!(record.source_coverage, 0.0);
        assert_eq!(record.overall_confidence, 0.0);
        assert!(record.conflicts.is_empty());
    }

    #[test]
    fn directive_conflict_detected() {
        let standards = [standard("std-1", "KCS 21 60 10", "작업발판을 반드시 설치한다")];
        let laws = [law("law-1", "산업안전보건법", "해당 구간 작업을 금지 한다")];
        let record = build_trust_layer("작업발판", &standards, &laws);

        let directive: Vec<&Conflict> = record
            .conflicts
            .iter()
            .filter(|c| c.conflict_type == ConflictType::DirectiveConflict)
            .collect();
        assert_eq!(directive.len(), 1, "conflicts: {:?}", record.conflicts);
        assert!(directive[0].evidence_refs.contains(&"std-1".to_string()));
        assert!(directive[0].evidence_refs.contains(&"law-1".to_string()));
    }

    #[test]
    fn must_not_is_not_mandatory() {
        assert_eq!(detect_polarity("scaffolding must not be removed"), -1);
        assert_eq!(detect_polarity("scaffolding must be inspected"), 1);
        assert_eq!(detect_polarity("general description of scaffolding"), 0);
    }

    #[test]
    fn both_polarities_in_one_text_neutralise() {
        assert_eq!(
            detect_polarity("access is prohibited but inspection is required"),
            0
        );
    }

    #[test]
    fn threshold_conflict_when_floor_exceeds_ceiling() {
        let standards = [standard("std-1", "KCS 14 20 12", "피복 두께는 5mm 이상 확보한다")];
        let laws = [law("law-1", "건설기술 진흥법", "허용 오차는 3mm 이하로 한다")];
        let record = build_trust_layer("피복 두께", &standards, &laws);

        let threshold: Vec<&Conflict> = record
            .conflicts
            .iter()
            .filter(|c| c.conflict_type == ConflictType::ThresholdConflict)
            .collect();
        assert_eq!(threshold.len(), 1, "conflicts: {:?}", record.conflicts);
        assert!(threshold[0].reason.contains("mm"));
        assert_eq!(threshold[0].evidence_refs, vec!["std-1", "law-1"]);
    }

    #[test]
    fn compatible_thresholds_raise_nothing() {
        let standards = [standard("std-1", "KCS 14 20 12", "피복 두께는 5mm 이상 확보한다")];
        let laws = [law("law-1", "건설기술 진흥법", "두께는 10mm 이하로 한다")];
        let record = build_trust_layer("피복 두께", &standards, &laws);
        assert!(
            record
                .conflicts
                .iter()
                .all(|c| c.conflict_type != ConflictType::ThresholdConflict),
            "conflicts: {:?}",
            record.conflicts
        );
    }

    #[test]
    fn different_units_never_conflict() {
        // 5cm floor vs 3mm ceiling: no unit conversion is attempted.
        let standards = [standard("std-1", "KCS 14 20 12", "간격은 5cm 이상으로 한다")];
        let laws = [law("law-1", "건설기술 진흥법", "오차는 3mm 이하로 한다")];
        let record = build_trust_layer("간격", &standards, &laws);
        assert!(
            record
                .conflicts
                .iter()
                .all(|c| c.conflict_type != ConflictType::ThresholdConflict)
        );
    }

    #[test]
    fn ascii_unit_spellings_fold_together() {
        assert_eq!(canonical_unit("m2"), "m²");
        assert_eq!(canonical_unit("m3"), "m³");
        assert_eq!(canonical_unit("days"), "day");
        assert_eq!(canonical_unit("일"), "day");
        assert_eq!(canonical_unit("kg"), "kg");
    }

    #[test]
    fn threshold_extraction_classifies_bounds() {
        let thresholds = extract_thresholds(
            "가설 통로의 폭은 90cm 이상으로 유지하고 별도 고시로 정한 구간에서 경사 한도는 30% 이하로 관리한다",
        );
        assert_eq!(thresholds.len(), 2, "{thresholds:?}");
        assert_eq!(thresholds[0].unit, "cm");
        assert_eq!(thresholds[0].bound, Bound::Min);
        assert_eq!(thresholds[1].unit, "%");
        assert_eq!(thresholds[1].bound, Bound::Max);
    }

    #[test]
    fn threshold_without_cue_is_exact() {
        let thresholds = extract_thresholds("표준 블록의 중량은 20kg 이다");
        assert_eq!(thresholds.len(), 1);
        assert_eq!(thresholds[0].bound, Bound::Exact);
    }

    #[test]
    fn unit_glued_to_word_is_rejected() {
        let thresholds = extract_thresholds("a crane rated for 5tons of load");
        assert!(thresholds.is_empty(), "{thresholds:?}");
    }

    #[test]
    fn conflicts_capped_at_six() {
        // Seven units, each with an impossible floor/ceiling pair, plus a
        // directive clash: only six conflicts survive.
        let floors = standard(
            "std-1",
            "KCS 00 00 00",
            "반드시 5mm 이상, 5cm 이상, 5m 이상, 5kg 이상, 5t 이상, 5% 이상, 5일 이상",
        );
        let ceilings = law(
            "law-1",
            "기준법",
            "금지 3mm 이하, 3cm 이하, 3m 이하, 3kg 이하, 3t 이하, 3% 이하, 3일 이하",
        );
        let record = build_trust_layer("기준", &[floors], &[ceilings]);
        assert_eq!(record.conflicts.len(), 6);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let mut standards = vec![
            standard("std-1", "KCS 21 60 10", "비계 기둥 간격은 1.85m 이하로 한다"),
            standard("std-2", "KCS 21 60 05", "비계 작업발판 폭은 40cm 이상으로 한다"),
        ];
        let mut laws = vec![law("law-1", "산업안전보건기준에 관한 규칙", "비계 점검을 하여야 한다")];
        attach_evidence_scores(&mut standards);
        attach_evidence_scores(&mut laws);
        let record = build_trust_layer("비계 작업발판 설치 기준", &standards, &laws);

        for score in [
            record.evidence_score,
            record.source_consistency_score,
            record.source_coverage,
            record.overall_confidence,
        ] {
            assert!((0.0..=1.0).contains(&score), "score out of bounds: {score}");
        }
    }

    #[test]
    fn token_agreement_defaults_without_tokens() {
        let signals: Vec<ItemSignals> = vec![];
        assert_eq!(token_agreement("", &signals), 0.5);
        assert_eq!(token_agreement("a of 그", &signals), 0.5);
    }

    #[test]
    fn significant_tokens_capped_and_deduped() {
        let tokens = significant_tokens(
            "scaffold scaffold anchor bolt torque spacing width depth height load wind rain snow ice",
        );
        assert_eq!(tokens.len(), MAX_QUERY_TOKENS);
        assert_eq!(tokens[0], "scaffold");
        assert_eq!(tokens[1], "anchor");
    }

    #[test]
    fn source_coverage_counts_unique_labels() {
        let a = standard("a", "KCS 21 60 10", "x");
        let b = standard("b", "KCS 21 60 10", "y");
        let c = standard("c", "KCS 21 60 05", "z");
        let items: Vec<&EvidenceItem> = vec![&a, &b, &c];
        let coverage = source_coverage(&items);
        assert!((coverage - 2.0 / 3.0).abs() < 1e-9, "got {coverage}");
    }
}
