//! Prompt assembly from ranked evidence.
//!
//! Prompts cite evidence by key so generated text can be traced back to
//! the items that grounded it.

use groundwork_core::{EvidenceItem, SourceRef};

/// Excerpt characters quoted per evidence item.
const PROMPT_EXCERPT_CHARS: usize = 400;

/// Prompt for a grounded natural-language answer.
pub fn answer_prompt(query: &str, standards: &[EvidenceItem], laws: &[EvidenceItem]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "당신은 건설 기준 전문가입니다. 아래 근거 발췌만 사용하여 질문에 답하고, \
         각 주장 뒤에 근거 키를 [key] 형식으로 표기하세요. 근거가 부족하면 부족하다고 답하세요.\n\n",
    );
    push_evidence_block(&mut prompt, "## 설계기준/표준시방서 근거", standards);
    push_evidence_block(&mut prompt, "## 법령 근거", laws);
    prompt.push_str("## 질문\n");
    prompt.push_str(query);
    prompt.push('\n');
    prompt
}

/// Prompt for an execution-checklist card. The completion must be a JSON
/// object matching [`crate::Card`].
pub fn card_prompt(query: &str, standards: &[EvidenceItem], laws: &[EvidenceItem]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "아래 근거 발췌를 바탕으로 실행 점검 카드를 JSON으로 작성하세요. \
         스키마: {\"one_liner\": string, \"checklist\": string[], \
         \"risks\": string[], \"required_documents\": string[]}. \
         JSON 외의 텍스트는 출력하지 마세요.\n\n",
    );
    push_evidence_block(&mut prompt, "## 설계기준/표준시방서 근거", standards);
    push_evidence_block(&mut prompt, "## 법령 근거", laws);
    prompt.push_str("## 작업\n");
    prompt.push_str(query);
    prompt.push('\n');
    prompt
}

fn push_evidence_block(prompt: &mut String, heading: &str, items: &[EvidenceItem]) {
    if items.is_empty() {
        return;
    }
    prompt.push_str(heading);
    prompt.push('\n');
    for item in items {
        let citation = match &item.source {
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
        };
        let excerpt: String = item.excerpt.chars().take(PROMPT_EXCERPT_CHARS).collect();
        prompt.push_str(&format!("- [{}] {citation}: {excerpt}\n", item.key));
    }
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_core::Retrieval;

    fn standard(key: &str) -> EvidenceItem {
        EvidenceItem {
            key: key.to_string(),
            source: SourceRef::Standard {
                title: "KCS 21 60 10 비계".into(),
                path: "3.2".into(),
            },
            excerpt: "작업발판의 폭은 40cm 이상으로 한다".into(),
            retrieval: Retrieval::Hybrid,
            raw_score: 1.0,
            evidence_score: 1.0,
        }
    }

    #[test]
    fn answer_prompt_cites_keys_and_query() {
        let prompt = answer_prompt("작업발판 폭 기준", &[standard("std-1")], &[]);
        assert!(prompt.contains("[std-1]"));
        assert!(prompt.contains("KCS 21 60 10 비계 3.2"));
        assert!(prompt.contains("작업발판 폭 기준"));
        assert!(!prompt.contains("법령 근거"), "empty block should be omitted");
    }

    #[test]
    fn card_prompt_demands_json_schema() {
        let prompt = card_prompt("비계 설치", &[standard("std-1")], &[]);
        assert!(prompt.contains("\"one_liner\""));
        assert!(prompt.contains("\"required_documents\""));
    }

    #[test]
    fn long_excerpts_are_truncated() {
        let mut item = standard("std-1");
        item.excerpt = "가".repeat(1000);
        let prompt = answer_prompt("질문", &[item], &[]);
        let line = prompt.lines().find(|l| l.starts_with("- [std-1]")).unwrap();
        assert!(line.chars().count() < 450);
    }
}
