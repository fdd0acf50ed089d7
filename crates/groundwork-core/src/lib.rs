pub mod evidence;
pub mod planner;
pub mod trust;

pub use evidence::{EvidenceItem, EvidenceKind, Retrieval, SourceRef, attach_evidence_scores};
pub use planner::{Scenario, ScenarioPlan, ScenarioType, TaskSpec, plan_scenarios};
pub use trust::{Conflict, ConflictType, TrustRecord, build_trust_layer};
