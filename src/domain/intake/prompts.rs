//! Prompt texts and fixed bot messages.

use super::symptoms::SymptomField;

pub const SYSTEM_PROMPT_NEXT_QUESTION: &str = "\
당신은 소아 호흡기 증상을 상담하는 친절한 간호사 챗봇입니다. \
보호자와의 대화 기록과 현재까지 파악된 환자 정보를 보고, 아직 파악되지 않은 항목 중 \
가장 중요한 것 하나를 묻는 짧은 질문을 한국어로 한 문장만 작성하세요. \
진단이나 처방은 하지 마세요. 충분한 정보가 모였다면 '분석'이라고 말하면 \
중간 분석을 받을 수 있다고 안내하세요.";

pub const SYSTEM_PROMPT_WAIT_MESSAGE: &str = "\
당신은 소아 호흡기 상담 챗봇입니다. 보호자에게 지금부터 대화 내용을 분석하니 \
잠시 기다려 달라는 따뜻한 안내 문장을 한국어로 한 문장만 작성하세요.";

/// Analysis prompt; lists every field label the model must fill.
pub fn system_prompt_analysis() -> String {
    let fields = SymptomField::ALL
        .iter()
        .map(|f| format!("\"{}\"", f.label()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "다음은 소아 호흡기 증상 상담 대화 기록입니다. 대화에서 확인된 내용만 근거로 \
         아래 키를 모두 가진 JSON 객체 하나만 출력하세요: {fields}. \
         증상이나 병력 항목은 \"Y\" 또는 \"N\", \"증상 지속\"과 \"기관지확장제 사용\"은 \
         기간이나 빈도를 적은 짧은 문자열(예: \"3개월 이상\")로 쓰고, \
         대화에서 언급되지 않은 항목은 null로 두세요. 설명은 쓰지 마세요."
    )
}

/// Wait message used whenever a generated one is unavailable.
pub const DEFAULT_WAIT_MESSAGE: &str =
    "지금까지의 대화 내용을 분석하고 있어요. 잠시만 기다려주세요!";

pub const CONFIRM_ANALYSIS_MESSAGE: &str =
    "지금까지 말씀해주신 내용으로 천식 가능성을 분석해볼까요?";
pub const CONFIRM_ANALYSIS_CHOICES: [&str; 2] = ["네, 분석해주세요", "아니요, 더 이야기할게요"];

pub const RESUME_COLLECTING_MESSAGE: &str =
    "알겠습니다. 더 말씀해주실 증상이 있으면 편하게 이야기해주세요.";

pub const STILL_ANALYZING_MESSAGE: &str = "분석을 진행하고 있으니 잠시만 기다려주세요...";

pub const POST_ANALYSIS_FOLLOW_UP: &str = "이 분석 외에 더 추가하거나 수정하고 싶은 내용이 있으신가요?\n(대화를 마치려면 '종료'라고 말씀해주세요.)";
pub const POST_ANALYSIS_CHOICES: [&str; 2] = ["네, 추가할 내용이 있어요", "아니요, 종료할게요"];

pub const TERMINATED_MESSAGE: &str = "네, 알겠습니다. 상담이 종료되었습니다. 이용해주셔서 감사합니다!";

pub const TURN_APOLOGY: &str = "죄송합니다, 답변을 준비하는 데 시간이 걸리고 있어요. 다시 한 번 말씀해주시겠어요?";
pub const ANALYSIS_APOLOGY: &str = "죄송합니다, 분석 중 오류가 발생했어요. 다시 시도해 주시겠어요?";
pub const CALLBACK_UNAVAILABLE_MESSAGE: &str =
    "지금은 분석 결과를 전달할 수 없는 환경이에요. 잠시 후 다시 시도해 주시겠어요?";
pub const TERMINATION_APOLOGY: &str =
    "죄송합니다, 상담을 마무리하는 중 오류가 발생했어요. 다시 '종료'라고 말씀해 주시겠어요?";

pub const BAD_REQUEST_MESSAGE: &str = "잘못된 요청입니다.";
pub const SYSTEM_ERROR_MESSAGE: &str = "시스템에 오류가 발생했어요. 잠시 후 다시 시도해주세요.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_names_every_field() {
        let prompt = system_prompt_analysis();
        for field in SymptomField::ALL {
            assert!(prompt.contains(&format!("\"{}\"", field.label())));
        }
    }
}
