//! HTTP DTOs for the skill webhook.
//!
//! The inbound body and the response envelope follow the messaging
//! platform's skill payload (`version: "2.0"`).

use serde::{Deserialize, Serialize};

use crate::application::ProcessAnalysisOutcome;
use crate::domain::intake::Reply;

/// Envelope version the platform expects.
pub const ENVELOPE_VERSION: &str = "2.0";

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Inbound skill request. Only the fields the bot reads are modeled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRequest {
    #[serde(default)]
    pub user_request: Option<UserRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[serde(default)]
    pub user: Option<SkillUser>,
    #[serde(default)]
    pub utterance: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillUser {
    #[serde(default)]
    pub id: Option<String>,
}

impl SkillRequest {
    pub fn user_id(&self) -> Option<&str> {
        self.user_request
            .as_ref()?
            .user
            .as_ref()?
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    pub fn utterance(&self) -> Option<&str> {
        self.user_request
            .as_ref()?
            .utterance
            .as_deref()
            .filter(|u| !u.is_empty())
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.user_request
            .as_ref()?
            .callback_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Skill response envelope in all three shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillResponse {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<SkillTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_callback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CallbackData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTemplate {
    pub outputs: Vec<SkillOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<SkillAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillOutput {
    SimpleText { text: String },
    BasicCard(BasicCard),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicCard {
    pub description: String,
    pub thumbnail: Thumbnail,
    #[serde(default)]
    pub buttons: Vec<SkillAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub image_url: String,
}

/// A quick reply chip or card button that sends its label back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillAction {
    pub label: String,
    pub action: String,
    pub message_text: String,
}

impl SkillAction {
    fn message(label: &str) -> Self {
        Self {
            label: label.to_string(),
            action: "message".to_string(),
            message_text: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackData {
    pub text: String,
}

/// Body returned to the dispatcher by the deferred-job endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackAck {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackAck {
    pub fn delivered(outcome: &ProcessAnalysisOutcome) -> Self {
        let status = match outcome {
            ProcessAnalysisOutcome::Completed(_) => "completed",
            ProcessAnalysisOutcome::DeliveredOnly(_) => "delivered_only",
            ProcessAnalysisOutcome::Failed => "failed",
        };
        Self {
            status: status.to_string(),
            error: None,
        }
    }

    pub fn undelivered(error: impl Into<String>) -> Self {
        Self {
            status: "undelivered".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            status: "rejected".to_string(),
            error: Some(error.into()),
        }
    }
}

impl SkillResponse {
    /// Plain text reply without chips.
    pub fn simple_text(text: impl Into<String>) -> Self {
        Self::from(&Reply::text(text))
    }
}

impl From<&Reply> for SkillResponse {
    fn from(reply: &Reply) -> Self {
        match reply {
            Reply::Text {
                text,
                quick_replies,
            } => Self {
                version: ENVELOPE_VERSION.to_string(),
                template: Some(SkillTemplate {
                    outputs: vec![SkillOutput::SimpleText { text: text.clone() }],
                    quick_replies: quick_replies.iter().map(|q| SkillAction::message(q)).collect(),
                }),
                use_callback: None,
                data: None,
            },
            Reply::Deferred { text } => Self {
                version: ENVELOPE_VERSION.to_string(),
                template: None,
                use_callback: Some(true),
                data: Some(CallbackData { text: text.clone() }),
            },
            Reply::Card {
                description,
                thumbnail_url,
                buttons,
            } => Self {
                version: ENVELOPE_VERSION.to_string(),
                template: Some(SkillTemplate {
                    outputs: vec![SkillOutput::BasicCard(BasicCard {
                        description: description.clone(),
                        thumbnail: Thumbnail {
                            image_url: thumbnail_url.clone(),
                        },
                        buttons: buttons.iter().map(|b| SkillAction::message(b)).collect(),
                    })],
                    quick_replies: Vec::new(),
                }),
                use_callback: None,
                data: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_platform_request() {
        let req: SkillRequest = serde_json::from_value(json!({
            "intent": {"id": "x"},
            "userRequest": {
                "user": {"id": "abc", "type": "botUserKey"},
                "utterance": "기침이 심해요",
                "callbackUrl": "https://callback.example/1"
            }
        }))
        .unwrap();

        assert_eq!(req.user_id(), Some("abc"));
        assert_eq!(req.utterance(), Some("기침이 심해요"));
        assert_eq!(req.callback_url(), Some("https://callback.example/1"));
    }

    #[test]
    fn missing_fields_read_as_none() {
        let req: SkillRequest = serde_json::from_value(json!({
            "userRequest": {"user": {"id": "  "}, "utterance": ""}
        }))
        .unwrap();

        assert_eq!(req.user_id(), None);
        assert_eq!(req.utterance(), None);
        assert_eq!(req.callback_url(), None);
        assert_eq!(SkillRequest::default().user_id(), None);
    }

    #[test]
    fn text_reply_envelope() {
        let reply = Reply::text_with_replies("분석해볼까요?", ["네", "아니요"]);
        let json = serde_json::to_value(SkillResponse::from(&reply)).unwrap();

        assert_eq!(
            json,
            json!({
                "version": "2.0",
                "template": {
                    "outputs": [{"simpleText": {"text": "분석해볼까요?"}}],
                    "quickReplies": [
                        {"label": "네", "action": "message", "messageText": "네"},
                        {"label": "아니요", "action": "message", "messageText": "아니요"}
                    ]
                }
            })
        );
    }

    #[test]
    fn text_reply_without_chips_omits_quick_replies() {
        let json = serde_json::to_value(SkillResponse::simple_text("안녕하세요")).unwrap();
        assert!(json["template"].get("quickReplies").is_none());
    }

    #[test]
    fn deferred_reply_envelope() {
        let json = serde_json::to_value(SkillResponse::from(&Reply::deferred("잠시만요"))).unwrap();
        assert_eq!(
            json,
            json!({"version": "2.0", "useCallback": true, "data": {"text": "잠시만요"}})
        );
    }

    #[test]
    fn card_reply_envelope() {
        let reply = Reply::card("결과", "https://img/high.png", ["종료"]);
        let json = serde_json::to_value(SkillResponse::from(&reply)).unwrap();

        let card = &json["template"]["outputs"][0]["basicCard"];
        assert_eq!(card["description"], "결과");
        assert_eq!(card["thumbnail"]["imageUrl"], "https://img/high.png");
        assert_eq!(card["buttons"][0]["messageText"], "종료");
    }
}
