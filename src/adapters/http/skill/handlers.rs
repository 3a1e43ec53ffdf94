//! HTTP handlers for the skill webhook.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{
    HandleUtteranceCommand, HandleUtteranceHandler, ProcessAnalysisCommand, ProcessAnalysisHandler,
};
use crate::domain::foundation::UserKey;
use crate::domain::intake::prompts::{BAD_REQUEST_MESSAGE, SYSTEM_ERROR_MESSAGE};
use crate::ports::AnalysisJob;

use super::dto::{CallbackAck, SkillRequest, SkillResponse};

/// Static body of the health probe.
pub const HEALTH_MESSAGE: &str = "Asthma Consultation Bot is running!";

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct SkillHandlers {
    utterance_handler: Arc<HandleUtteranceHandler>,
    analysis_handler: Arc<ProcessAnalysisHandler>,
}

impl SkillHandlers {
    pub fn new(
        utterance_handler: Arc<HandleUtteranceHandler>,
        analysis_handler: Arc<ProcessAnalysisHandler>,
    ) -> Self {
        Self {
            utterance_handler,
            analysis_handler,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// GET / - Health probe
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_MESSAGE)
}

/// POST /skill - One conversation turn
pub async fn handle_skill(
    State(handlers): State<SkillHandlers>,
    body: Result<Json<SkillRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable skill request");
            return bad_request();
        }
    };

    let (Some(user_id), Some(utterance)) = (req.user_id(), req.utterance()) else {
        tracing::warn!("skill request without user id or utterance");
        return bad_request();
    };
    let Ok(user_key) = UserKey::new(user_id) else {
        return bad_request();
    };

    let cmd = HandleUtteranceCommand {
        user_key,
        utterance: utterance.to_string(),
        callback_url: req.callback_url().map(str::to_string),
    };

    match handlers.utterance_handler.handle(cmd).await {
        Ok(reply) => (StatusCode::OK, Json(SkillResponse::from(&reply))).into_response(),
        Err(e) => {
            tracing::error!(user_key = %user_id, error = %e, "turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SkillResponse::simple_text(SYSTEM_ERROR_MESSAGE)),
            )
                .into_response()
        }
    }
}

/// POST /process-analysis-callback - Deferred analysis job
///
/// Answers 200 on every outcome except an unreadable job, so the
/// dispatcher does not redeliver jobs that already used their callback.
pub async fn process_analysis_callback(
    State(handlers): State<SkillHandlers>,
    body: Result<Json<AnalysisJob>, JsonRejection>,
) -> Response {
    let job = match body {
        Ok(Json(job)) => job,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable analysis job");
            return (
                StatusCode::BAD_REQUEST,
                Json(CallbackAck::rejected(rejection.body_text())),
            )
                .into_response();
        }
    };

    let job_id = job.job_id;
    let ack = match handlers
        .analysis_handler
        .handle(ProcessAnalysisCommand { job })
        .await
    {
        Ok(outcome) => CallbackAck::delivered(&outcome),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "analysis reply not delivered");
            CallbackAck::undelivered(e.to_string())
        }
    };

    (StatusCode::OK, Json(ack)).into_response()
}

fn bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(SkillResponse::simple_text(BAD_REQUEST_MESSAGE)),
    )
        .into_response()
}
