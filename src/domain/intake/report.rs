//! Response formatter - judgement and symptoms as user-facing text.

use super::judgement::Judgement;
use super::symptoms::ExtractedData;

const NOTHING_GATHERED: &str = "아직 파악된 정보가 없습니다.";

/// Formatted analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Possibility statement and the deciding reason.
    pub summary_text: String,
    /// One bullet per set field, in field declaration order.
    pub symptom_summary_lines: Vec<String>,
}

impl Report {
    /// Full report text.
    pub fn render(&self) -> String {
        format!(
            "{}\n\n[현재까지 파악된 증상 요약]\n{}",
            self.summary_text,
            self.symptom_summary_lines.join("\n")
        )
    }
}

/// Builds the report for a judgement over `data`.
pub fn format_report(judgement: &Judgement, data: &ExtractedData) -> Report {
    let summary_text = format!(
        "[AI 중간 분석 결과]\n천식 가능성이 '{}'으로 생각됩니다.\n\n[판단 근거]\n{}",
        judgement.possibility.label(),
        judgement.reason
    );

    let mut symptom_summary_lines: Vec<String> = data
        .iter()
        .map(|(field, value)| format!("• {}: {}", field.label(), value))
        .collect();
    if symptom_summary_lines.is_empty() {
        symptom_summary_lines.push(NOTHING_GATHERED.to_string());
    }

    Report {
        summary_text,
        symptom_summary_lines,
    }
}
