//! HTTP routes for the skill webhook.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;

use super::handlers::{handle_skill, health, process_analysis_callback, SkillHandlers};

/// Path the dispatcher delivers deferred jobs to.
pub const ANALYSIS_CALLBACK_PATH: &str = "/process-analysis-callback";

/// Creates the skill router with all endpoints.
///
/// `turn_timeout` bounds `/skill` only; the deferred-job endpoint runs
/// the full analysis and is bounded by the dispatcher instead.
pub fn skill_routes(handlers: SkillHandlers, turn_timeout: Duration) -> Router {
    let turns = Router::new()
        .route("/skill", post(handle_skill))
        .layer(TimeoutLayer::new(turn_timeout));

    Router::new()
        .route("/", get(health))
        .route(ANALYSIS_CALLBACK_PATH, post(process_analysis_callback))
        .merge(turns)
        .with_state(handlers)
}
