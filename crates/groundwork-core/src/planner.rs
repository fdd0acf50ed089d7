//! Schedule-adequacy scenario planning.
//!
//! Given a current and target duration plus the task list, produces exactly
//! three alternative improvement scenarios (manpower, productivity,
//! parallelization). Gain ratios are capped per type to keep the proposals
//! plausible; the caps and coefficients are part of the contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Most evidence references attached to one scenario.
const MAX_SCENARIO_REFS: usize = 4;

/// One schedule task as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub duration_days: f64,
    /// On the critical path. When no task is flagged, the whole list is
    /// treated as critical.
    #[serde(default)]
    pub critical: bool,
    /// Can overlap with other critical work.
    #[serde(default)]
    pub parallelizable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    Manpower,
    Productivity,
    Parallelization,
}

/// One schedule-improvement proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub expected_days: i64,
    /// `expected_days - current_days`; negative when the scenario shortens
    /// the schedule.
    pub delta_days: i64,
    pub meets_target: bool,
    /// `expected_days - target_days`; zero or negative when the target is
    /// reached.
    pub target_gap_days: i64,
    pub assumptions: BTreeMap<String, String>,
    pub actions: Vec<String>,
    pub evidence_refs: Vec<String>,
}

/// The fixed set of three scenarios plus the primary pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPlan {
    pub scenarios: Vec<Scenario>,
    /// Scenario whose `target_gap_days` is closest to zero in absolute
    /// value; ties broken by encounter order.
    pub primary_scenario_id: String,
}

/// Produce the three improvement scenarios for a schedule.
///
/// `current_days` must be positive (validated by the caller); an empty task
/// list still yields three scenarios, with the parallelization gain driven
/// by the gap ratio alone.
pub fn plan_scenarios(
    current_days: f64,
    target_days: f64,
    tasks: &[TaskSpec],
    evidence_refs: &[String],
) -> ScenarioPlan {
    let gap = (current_days - target_days).max(0.0);
    let gap_ratio = if current_days > 0.0 {
        gap / current_days
    } else {
        0.0
    };

    let flagged: Vec<&TaskSpec> = tasks.iter().filter(|t| t.critical).collect();
    let critical: Vec<&TaskSpec> = if flagged.is_empty() {
        tasks.iter().collect()
    } else {
        flagged
    };
    let critical_days: f64 = critical.iter().map(|t| t.duration_days).sum();
    let parallel_days: f64 = critical
        .iter()
        .filter(|t| t.parallelizable)
        .map(|t| t.duration_days)
        .sum();
    let parallel_ratio = if critical_days > 0.0 {
        parallel_days / critical_days
    } else {
        0.0
    };

    let refs: Vec<String> = evidence_refs.iter().take(MAX_SCENARIO_REFS).cloned().collect();

    let scenarios = vec![
        build(
            "s1-manpower",
            ScenarioType::Manpower,
            (0.06 + 0.40 * gap_ratio).min(0.22),
            current_days,
            target_days,
            manpower_assumptions(),
            manpower_actions(),
            &refs,
        ),
        build(
            "s2-productivity",
            ScenarioType::Productivity,
            (0.08 + 0.50 * gap_ratio).min(0.28),
            current_days,
            target_days,
            productivity_assumptions(),
            productivity_actions(),
            &refs,
        ),
        build(
            "s3-parallel",
            ScenarioType::Parallelization,
            (0.05 + 0.35 * parallel_ratio + 0.20 * gap_ratio).min(0.30),
            current_days,
            target_days,
            parallel_assumptions(parallel_ratio),
            parallel_actions(),
            &refs,
        ),
    ];

    let primary_scenario_id = scenarios
        .iter()
        .min_by_key(|s| s.target_gap_days.abs())
        .map(|s| s.id.clone())
        .unwrap_or_default();

    debug!(
        gap_ratio,
        parallel_ratio,
        primary = %primary_scenario_id,
        "scenario plan built"
    );

    ScenarioPlan {
        scenarios,
        primary_scenario_id,
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    id: &str,
    scenario_type: ScenarioType,
    gain: f64,
    current_days: f64,
    target_days: f64,
    assumptions: BTreeMap<String, String>,
    actions: Vec<String>,
    refs: &[String],
) -> Scenario {
    let expected_days = ((current_days * (1.0 - gain)).round() as i64).max(1);
    let delta_days = expected_days - current_days.round() as i64;
    let target_gap_days = expected_days - target_days.round() as i64;
    Scenario {
        id: id.to_string(),
        scenario_type,
        expected_days,
        delta_days,
        meets_target: (expected_days as f64) <= target_days,
        target_gap_days,
        assumptions,
        actions,
        evidence_refs: refs.to_vec(),
    }
}

fn manpower_assumptions() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("crew_increase".to_string(), "10~20% 증원".to_string()),
        ("work_hours".to_string(), "법정 한도 내 유지".to_string()),
    ])
}

fn manpower_actions() -> Vec<String> {
    vec![
        "병목 공종에 전담 작업조를 추가 투입한다".to_string(),
        "증원 인력의 안전교육과 장비 배정을 선행한다".to_string(),
        "주간 단위로 투입 대비 진척률을 재검증한다".to_string(),
    ]
}

fn productivity_assumptions() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("method_change".to_string(), "공법 개선 및 선조립 확대".to_string()),
        ("rework_rate".to_string(), "재작업률 5% 이하 유지".to_string()),
    ])
}

fn productivity_actions() -> Vec<String> {
    vec![
        "반복 공종에 선조립·모듈화 공법을 적용한다".to_string(),
        "자재 선입고로 대기 시간을 제거한다".to_string(),
        "품질 검측 선행으로 재작업을 줄인다".to_string(),
        "야간 양생 등 비작업 시간을 활용한다".to_string(),
    ]
}

fn parallel_assumptions(parallel_ratio: f64) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "parallel_ratio".to_string(),
            format!("병행 가능 주공정 비율 {:.0}%", parallel_ratio * 100.0),
        ),
        ("interface_risk".to_string(), "공종 간 간섭 사전 조정".to_string()),
    ])
}

fn parallel_actions() -> Vec<String> {
    vec![
        "병행 가능한 주공정 작업을 구간별로 중첩 배치한다".to_string(),
        "선·후행 공종의 간섭 구간을 사전 조정한다".to_string(),
        "공구 분할로 장비·양중 동선을 분리한다".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, days: f64, critical: bool, parallelizable: bool) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            duration_days: days,
            critical,
            parallelizable,
        }
    }

    #[test]
    fn always_three_scenarios() {
        let plan = plan_scenarios(150.0, 120.0, &[], &[]);
        assert_eq!(plan.scenarios.len(), 3);
        let plan_empty_target = plan_scenarios(10.0, 10.0, &[], &[]);
        assert_eq!(plan_empty_target.scenarios.len(), 3);
    }

    #[test]
    fn expected_days_within_bounds_and_caps() {
        let tasks = vec![
            task("터파기", 30.0, true, false),
            task("골조", 60.0, true, true),
            task("마감", 40.0, false, true),
        ];
        let refs = vec!["std-1".to_string()];
        let plan = plan_scenarios(150.0, 120.0, &tasks, &refs);

        for scenario in &plan.scenarios {
            assert!(
                scenario.expected_days >= 1 && scenario.expected_days <= 150,
                "{}: expected_days {}",
                scenario.id,
                scenario.expected_days
            );
            let gain = 1.0 - scenario.expected_days as f64 / 150.0;
            let cap = match scenario.scenario_type {
                ScenarioType::Manpower => 0.22,
                ScenarioType::Productivity => 0.28,
                ScenarioType::Parallelization => 0.30,
            };
            // Rounding to whole days can overshoot the cap by half a day at
            // most.
            assert!(
                gain <= cap + 0.5 / 150.0,
                "{}: gain {gain} above cap {cap}",
                scenario.id
            );
        }
    }

    #[test]
    fn gains_follow_documented_formulas() {
        // current=150, target=120: gap_ratio = 0.2.
        let plan = plan_scenarios(150.0, 120.0, &[], &[]);
        // manpower: 0.06 + 0.40*0.2 = 0.14 -> 129 days
        assert_eq!(plan.scenarios[0].expected_days, 129);
        // productivity: 0.08 + 0.50*0.2 = 0.18 -> 123 days
        assert_eq!(plan.scenarios[1].expected_days, 123);
        // parallelization, no tasks: 0.05 + 0.20*0.2 = 0.09 -> 137 days (rounded)
        assert_eq!(plan.scenarios[2].expected_days, 137);
        assert_eq!(plan.scenarios[0].delta_days, -21);
    }

    #[test]
    fn primary_is_closest_to_target() {
        let plan = plan_scenarios(150.0, 120.0, &[], &[]);
        // Gaps: 129-120=9, 123-120=3, 137-120=17 -> productivity wins.
        assert_eq!(plan.primary_scenario_id, "s2-productivity");
        assert!(!plan.scenarios[0].meets_target);
    }

    #[test]
    fn unflagged_task_list_is_all_critical() {
        let tasks = vec![
            task("a", 50.0, false, true),
            task("b", 50.0, false, false),
        ];
        // No critical flags: parallel_ratio = 50/100 = 0.5.
        // gain = min(0.30, 0.05 + 0.35*0.5 + 0.20*0.2) = min(0.30, 0.265)
        let plan = plan_scenarios(150.0, 120.0, &tasks, &[]);
        let parallel = &plan.scenarios[2];
        // 150 * (1 - 0.265) = 110.25 -> 110
        assert_eq!(parallel.expected_days, 110);
        assert!(parallel.meets_target);
    }

    #[test]
    fn evidence_refs_capped_at_four() {
        let refs: Vec<String> = (0..10).map(|i| format!("ref-{i}")).collect();
        let plan = plan_scenarios(100.0, 90.0, &[], &refs);
        for scenario in &plan.scenarios {
            assert_eq!(scenario.evidence_refs.len(), 4);
        }
    }

    #[test]
    fn target_already_met_keeps_floor_gains() {
        // gap = 0: gains fall back to the per-type base rates.
        let plan = plan_scenarios(100.0, 100.0, &[], &[]);
        // manpower base 0.06 -> 94 days
        assert_eq!(plan.scenarios[0].expected_days, 94);
        assert!(plan.scenarios[0].meets_target);
    }

    #[test]
    fn tiny_schedule_never_drops_below_one_day() {
        let plan = plan_scenarios(1.0, 1.0, &[], &[]);
        for scenario in &plan.scenarios {
            assert_eq!(scenario.expected_days, 1);
        }
    }
}
