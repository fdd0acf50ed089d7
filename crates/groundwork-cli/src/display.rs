//! Terminal rendering for search results, answers, cards, and schedule
//! advice.

use groundwork_core::EvidenceItem;
use groundwork_service::{AgentAdvice, Card, SearchResponse};

pub fn search(response: &SearchResponse) {
    if let Some(warning) = &response.warning {
        println!("⚠ {warning}");
    }

    section("설계기준·표준시방서", &response.standards);
    section("법령", &response.laws);

    let trust = &response.trust;
    println!("── 신뢰도 ──");
    println!(
        "  근거 {:.2} · 일관성 {:.2} · 출처 커버리지 {:.2} · 종합 {:.2}",
        trust.evidence_score,
        trust.source_consistency_score,
        trust.source_coverage,
        trust.overall_confidence
    );
    for conflict in &trust.conflicts {
        println!("  ⚠ 충돌: {} ({})", conflict.reason, conflict.evidence_refs.join(", "));
    }
    println!(
        "  [{} · cache {}]",
        response.cache_meta.effective_mode,
        if response.cache_meta.hit { "hit" } else { "miss" }
    );
}

fn section(heading: &str, items: &[EvidenceItem]) {
    if items.is_empty() {
        return;
    }
    println!("── {heading} ──");
    for item in items {
        let excerpt: String = item.excerpt.chars().take(120).collect();
        println!("  [{:.4}] {} — {excerpt}", item.evidence_score, item.key);
    }
}

pub fn answer(text: &str) {
    println!("── 답변 ──");
    println!("{text}");
}

pub fn card(card: &Card) {
    println!("── 실행 카드 ──");
    println!("{}", card.one_liner);
    for step in &card.checklist {
        println!("  ☐ {step}");
    }
    if !card.risks.is_empty() {
        println!("  위험요인: {}", card.risks.join(" · "));
    }
    if !card.required_documents.is_empty() {
        println!("  필요서류: {}", card.required_documents.join(" · "));
    }
}

pub fn advice(advice: &AgentAdvice) {
    println!(
        "현재 {}일 → 목표 {}일 (격차 {}일)",
        advice.baseline.current_days, advice.baseline.target_days, advice.baseline.gap_days
    );
    if !advice.bottlenecks.is_empty() {
        println!("── 병목 공종 ──");
        for b in &advice.bottlenecks {
            println!("  {} — {}일 ({:.0}%)", b.task, b.duration_days, b.share * 100.0);
        }
    }
    println!("── 시나리오 ──");
    for scenario in &advice.plan.scenarios {
        let marker = if scenario.id == advice.plan.primary_scenario_id {
            "★"
        } else {
            " "
        };
        println!(
            "{marker} {} — 예상 {}일 (목표 대비 {:+}일{})",
            scenario.id,
            scenario.expected_days,
            scenario.target_gap_days,
            if scenario.meets_target { ", 목표 달성" } else { "" }
        );
        for action in &scenario.actions {
            println!("    · {action}");
        }
    }
    println!(
        "신뢰도 종합 {:.2} · 근거 {}건",
        advice.evidence.trust.overall_confidence,
        advice.evidence.links.len()
    );
}
