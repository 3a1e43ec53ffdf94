//! Intent detection by phrase containment.
//!
//! Deliberately plain: an utterance carries an intent when it contains
//! one of the intent's phrases, case-sensitively. No tokenization, no
//! negation handling. "분석" inside an unrelated word still matches.

/// Phrases asking for the analysis to run.
pub const ANALYSIS_REQUEST_PHRASES: &[&str] = &["분석"];

/// Phrases accepting the analysis confirmation.
pub const AFFIRMATIVE_PHRASES: &[&str] = &["네", "예", "응", "좋아", "시작", "분석해"];

/// Phrases ending the conversation.
pub const TERMINATION_PHRASES: &[&str] = &["종료", "그만", "끝낼"];

/// What an utterance asks for, as far as state transitions care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    RequestAnalysis,
    Affirm,
    Terminate,
}

impl Intent {
    fn phrases(&self) -> &'static [&'static str] {
        match self {
            Intent::RequestAnalysis => ANALYSIS_REQUEST_PHRASES,
            Intent::Affirm => AFFIRMATIVE_PHRASES,
            Intent::Terminate => TERMINATION_PHRASES,
        }
    }

    /// True when `utterance` contains any phrase of this intent.
    pub fn matches(&self, utterance: &str) -> bool {
        self.phrases().iter().any(|phrase| utterance.contains(phrase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_request_is_substring_match() {
        assert!(Intent::RequestAnalysis.matches("이제 분석해 주세요"));
        assert!(Intent::RequestAnalysis.matches("분석"));
        assert!(!Intent::RequestAnalysis.matches("기침이 심해요"));
    }

    #[test]
    fn affirmative_phrases() {
        assert!(Intent::Affirm.matches("네, 분석해주세요"));
        assert!(Intent::Affirm.matches("좋아요"));
        assert!(!Intent::Affirm.matches("아니요, 더 이야기할게요"));
    }

    #[test]
    fn termination_phrases() {
        assert!(Intent::Terminate.matches("종료"));
        assert!(Intent::Terminate.matches("아니요, 종료할게요"));
        assert!(!Intent::Terminate.matches("네, 추가할 내용이 있어요"));
    }
}
