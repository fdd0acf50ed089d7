//! Schedule-adequacy recommendation grounded in retrieved evidence.

use groundwork_core::{ScenarioPlan, TaskSpec, TrustRecord, plan_scenarios};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::enrich::citation;
use crate::{SearchMode, Service, ServiceError};

const AGENT_TASKS_MAX: usize = 300;
const AGENT_LIMIT_MIN: usize = 2;
const AGENT_LIMIT_MAX: usize = 12;
/// Bottleneck tasks surfaced per call.
const BOTTLENECKS_MAX: usize = 5;
/// Task names folded into the grounding query.
const QUERY_TASKS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    pub current_days: f64,
    pub target_days: f64,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_mode() -> SearchMode {
    SearchMode::Hybrid
}
fn default_limit() -> usize {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub current_days: f64,
    pub target_days: f64,
    pub gap_days: f64,
    pub gap_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    pub task: String,
    pub duration_days: f64,
    /// Share of the critical-path duration.
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub key: String,
    pub citation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvidence {
    pub trust: TrustRecord,
    pub links: Vec<EvidenceLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAdvice {
    pub baseline: Baseline,
    pub bottlenecks: Vec<Bottleneck>,
    #[serde(flatten)]
    pub plan: ScenarioPlan,
    pub evidence: AgentEvidence,
}

impl Service {
    /// Three schedule-improvement scenarios with their evidence grounding.
    pub async fn duration_agent(&self, request: AgentRequest) -> Result<AgentAdvice, ServiceError> {
        if request.current_days <= 0.0 || request.target_days <= 0.0 {
            return Err(ServiceError::InvalidInput(
                "durations must be positive".into(),
            ));
        }
        if request.tasks.len() > AGENT_TASKS_MAX {
            return Err(ServiceError::InvalidInput(format!(
                "task list of {} exceeds {AGENT_TASKS_MAX}",
                request.tasks.len()
            )));
        }
        let limit = request.limit.clamp(AGENT_LIMIT_MIN, AGENT_LIMIT_MAX);

        let cache_key = agent_cache_key(&request, limit);
        if let Some(cached) = self.caches.duration.get(&cache_key) {
            return Ok(cached);
        }

        let critical = critical_tasks(&request.tasks);
        let critical_days: f64 = critical.iter().map(|t| t.duration_days).sum();

        let query = grounding_query(&critical);
        let search = self.search(&query, limit, request.mode).await?;

        let evidence_refs: Vec<String> = search
            .standards
            .iter()
            .chain(search.laws.iter())
            .map(|item| item.key.clone())
            .collect();
        let plan = plan_scenarios(
            request.current_days,
            request.target_days,
            &request.tasks,
            &evidence_refs,
        );

        let mut bottlenecks: Vec<Bottleneck> = critical
            .iter()
            .map(|task| Bottleneck {
                task: task.name.clone(),
                duration_days: task.duration_days,
                share: if critical_days > 0.0 {
                    task.duration_days / critical_days
                } else {
                    0.0
                },
            })
            .collect();
        bottlenecks.sort_by(|a, b| {
            b.duration_days
                .total_cmp(&a.duration_days)
                .then_with(|| a.task.cmp(&b.task))
        });
        bottlenecks.truncate(BOTTLENECKS_MAX);

        let gap_days = (request.current_days - request.target_days).max(0.0);
        let advice = AgentAdvice {
            baseline: Baseline {
                current_days: request.current_days,
                target_days: request.target_days,
                gap_days,
                gap_ratio: gap_days / request.current_days,
            },
            bottlenecks,
            plan,
            evidence: AgentEvidence {
                links: search
                    .standards
                    .iter()
                    .chain(search.laws.iter())
                    .map(|item| EvidenceLink {
                        key: item.key.clone(),
                        citation: citation(&item.source),
                    })
                    .collect(),
                trust: search.trust,
            },
        };

        info!(
            current = request.current_days,
            target = request.target_days,
            primary = %advice.plan.primary_scenario_id,
            "duration advice computed"
        );
        self.caches.duration.set(&cache_key, advice.clone());
        Ok(advice)
    }
}

/// Tasks flagged critical, or the whole list when nothing is flagged.
fn critical_tasks(tasks: &[TaskSpec]) -> Vec<&TaskSpec> {
    let flagged: Vec<&TaskSpec> = tasks.iter().filter(|t| t.critical).collect();
    if flagged.is_empty() {
        tasks.iter().collect()
    } else {
        flagged
    }
}

/// Grounding query from the heaviest critical tasks.
fn grounding_query(critical: &[&TaskSpec]) -> String {
    let mut heaviest: Vec<&&TaskSpec> = critical.iter().collect();
    heaviest.sort_by(|a, b| b.duration_days.total_cmp(&a.duration_days));
    let names: Vec<&str> = heaviest
        .iter()
        .take(QUERY_TASKS)
        .map(|t| t.name.as_str())
        .collect();
    if names.is_empty() {
        "공사 기간 단축 기준".to_string()
    } else {
        format!("{} 공기 단축 기준", names.join(" "))
    }
}

fn agent_cache_key(request: &AgentRequest, limit: usize) -> String {
    let tasks: Vec<String> = request
        .tasks
        .iter()
        .map(|t| {
            format!(
                "{}:{}:{}:{}",
                t.name, t.duration_days, t.critical as u8, t.parallelizable as u8
            )
        })
        .collect();
    format!(
        "{}:{}:{}:{limit}:{}",
        request.current_days,
        request.target_days,
        request.mode,
        tasks.join("\u{1f}")
    )
}
