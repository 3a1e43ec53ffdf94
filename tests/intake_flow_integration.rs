//! End-to-end intake flow against in-memory adapters.
//!
//! Drives whole conversations through the skill router: turns over
//! `POST /skill`, deferred analysis through the dispatcher delivering to
//! `POST /process-analysis-callback`, replies through the recording
//! callback sender.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::Router;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use asthma_intake::adapters::ai::{LlmIntakeAssistant, MockAIProvider};
use asthma_intake::adapters::archive::InMemoryArchiveWriter;
use asthma_intake::adapters::callback::RecordingCallbackSender;
use asthma_intake::adapters::http::skill::ANALYSIS_CALLBACK_PATH;
use asthma_intake::adapters::http::{skill_routes, SkillHandlers};
use asthma_intake::adapters::queue::{
    AnalysisDispatcher, AnalysisDispatcherConfig, DeliveryError, InMemoryAnalysisQueue, JobTarget,
    PollOutcome,
};
use asthma_intake::adapters::storage::InMemoryConversationStore;
use asthma_intake::application::{
    HandleUtteranceHandler, ProcessAnalysisHandler, ResultCardImages,
};
use asthma_intake::domain::foundation::UserKey;
use asthma_intake::domain::intake::prompts::{
    CONFIRM_ANALYSIS_MESSAGE, TERMINATED_MESSAGE, TURN_APOLOGY,
};
use asthma_intake::domain::intake::{IntakeState, Possibility, Reply};
use asthma_intake::ports::{AnalysisJob, AnalysisQueue, ConversationStore};

// =============================================================================
// Test Infrastructure
// =============================================================================

const USER: &str = "kakao-user-42";
const CALLBACK_URL: &str = "https://bot-api.kakao.example/callback/abc";

/// Delivers jobs straight into the router, as the HTTP target would.
struct RouterTarget {
    router: Router,
}

#[async_trait]
impl JobTarget for RouterTarget {
    async fn deliver(&self, job: &AnalysisJob) -> Result<(), DeliveryError> {
        let request = Request::post(ANALYSIS_CALLBACK_PATH)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(job).unwrap()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: response.status().as_u16(),
            })
        }
    }
}

struct Harness {
    router: Router,
    store: Arc<InMemoryConversationStore>,
    queue: Arc<InMemoryAnalysisQueue>,
    archive: Arc<InMemoryArchiveWriter>,
    callback: Arc<RecordingCallbackSender>,
    dispatcher: AnalysisDispatcher,
}

fn harness(questions: MockAIProvider, analysis: MockAIProvider, turn_deadline: Duration) -> Harness {
    let store = Arc::new(InMemoryConversationStore::new());
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let archive = Arc::new(InMemoryArchiveWriter::new());
    let callback = Arc::new(RecordingCallbackSender::new());
    let assistant = Arc::new(
        LlmIntakeAssistant::new(Arc::new(questions), Arc::new(analysis))
            .with_turn_deadline(turn_deadline)
            .with_wait_message_deadline(Duration::from_millis(200)),
    );

    let handlers = SkillHandlers::new(
        Arc::new(HandleUtteranceHandler::new(
            store.clone(),
            assistant.clone(),
            queue.clone(),
            archive.clone(),
        )),
        Arc::new(ProcessAnalysisHandler::new(
            store.clone(),
            assistant,
            callback.clone(),
            ResultCardImages {
                high_risk_url: "https://img.example/high.png".to_string(),
                low_risk_url: "https://img.example/low.png".to_string(),
            },
        )),
    );
    let router = skill_routes(handlers, Duration::from_secs(5));

    let dispatcher = AnalysisDispatcher::new(
        queue.clone(),
        Arc::new(RouterTarget {
            router: router.clone(),
        }),
        AnalysisDispatcherConfig::default()
            .with_poll_timeout(Duration::from_millis(50))
            .with_retry_backoff(Duration::from_millis(1)),
    );

    Harness {
        router,
        store,
        queue,
        archive,
        callback,
        dispatcher,
    }
}

fn user() -> UserKey {
    UserKey::new(USER).unwrap()
}

/// POSTs one utterance to /skill and returns status and envelope.
async fn say(router: &Router, utterance: &str) -> (StatusCode, Value) {
    let body = json!({
        "userRequest": {
            "user": {"id": USER},
            "utterance": utterance,
            "callbackUrl": CALLBACK_URL
        }
    });
    let request = Request::post("/skill")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn simple_text(envelope: &Value) -> &str {
    envelope["template"]["outputs"][0]["simpleText"]["text"]
        .as_str()
        .unwrap_or_default()
}

fn present_analysis() -> String {
    json!({
        "기침": "Y",
        "쌕쌕거림": "Y",
        "야간": "Y",
        "증상 지속": "3개월 이상 반복",
        "발열": "N",
        "인후통": "N",
        "가족력": "Y"
    })
    .to_string()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn full_conversation_from_first_turn_to_termination() {
    let questions = MockAIProvider::new()
        .with_response("기침은 언제부터 시작됐나요?")
        .with_response("밤에 특히 심한가요?")
        .with_response("결과를 정리하고 있어요. 잠시만 기다려 주세요!");
    let analysis = MockAIProvider::new()
        .with_response(format!("```json\n{}\n```", present_analysis()));
    let h = harness(questions, analysis, Duration::from_secs(2));

    // First utterance: INIT -> COLLECTING with a generated question.
    let (status, envelope) = say(&h.router, "기침이 심해요").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(simple_text(&envelope), "기침은 언제부터 시작됐나요?");
    let record = h.store.get(&user()).await.unwrap().unwrap();
    assert_eq!(record.state, IntakeState::Collecting);
    assert_eq!(record.history.len(), 2);

    say(&h.router, "3개월 넘게 쌕쌕거려요").await;

    // Analysis request: confirmation without touching history.
    let (_, envelope) = say(&h.router, "분석해주세요").await;
    assert_eq!(simple_text(&envelope), CONFIRM_ANALYSIS_MESSAGE);
    assert_eq!(envelope["template"]["quickReplies"].as_array().unwrap().len(), 2);
    let record = h.store.get(&user()).await.unwrap().unwrap();
    assert_eq!(record.state, IntakeState::ConfirmAnalysis);
    assert_eq!(record.history.len(), 4);

    // Affirmation: deferred acknowledgment, one job queued.
    let (_, envelope) = say(&h.router, "네, 분석해주세요").await;
    assert_eq!(envelope["useCallback"], true);
    assert_eq!(
        envelope["data"]["text"],
        "결과를 정리하고 있어요. 잠시만 기다려 주세요!"
    );
    assert_eq!(h.queue.pending_jobs().await.len(), 1);

    // The dispatcher delivers the job; exactly one callback goes out.
    assert_eq!(h.dispatcher.poll_once().await.unwrap(), PollOutcome::Delivered);
    let deliveries = h.callback.deliveries().await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].callback_url, CALLBACK_URL);
    match &deliveries[0].reply {
        Reply::Card {
            description,
            thumbnail_url,
            ..
        } => {
            assert!(description.contains("천식 가능성이 '있음'"));
            assert!(description.contains("• 쌕쌕거림: Y"));
            assert_eq!(thumbnail_url, "https://img.example/high.png");
        }
        other => panic!("unexpected reply {:?}", other),
    }
    let record = h.store.get(&user()).await.unwrap().unwrap();
    assert_eq!(record.state, IntakeState::PostAnalysis);
    assert_eq!(
        record.last_judgement.map(|j| j.possibility),
        Some(Possibility::Present)
    );

    // Termination: archived once, then deleted.
    let (_, envelope) = say(&h.router, "아니요, 종료할게요").await;
    assert_eq!(simple_text(&envelope), TERMINATED_MESSAGE);
    let rows = h.archive.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_key, USER);
    assert_eq!(rows[0].final_judgement, "있음");
    assert!(rows[0].conversation_id.starts_with(&format!("{}-", USER)));
    assert!(rows[0].raw_conversation.starts_with("사용자: 기침이 심해요"));
    assert!(h.store.get(&user()).await.unwrap().is_none());
}

#[tokio::test]
async fn slow_model_gets_an_apology_and_no_state_change() {
    let questions = MockAIProvider::new()
        .with_response("기침은 언제부터 시작됐나요?")
        .with_delay(Duration::from_millis(300));
    let h = harness(questions, MockAIProvider::new(), Duration::from_millis(50));

    let (status, envelope) = say(&h.router, "기침이 심해요").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(simple_text(&envelope), TURN_APOLOGY);
    assert!(h.store.get(&user()).await.unwrap().is_none());
}

#[tokio::test]
async fn redelivered_job_converges_and_calls_back_twice() {
    let questions = MockAIProvider::new()
        .with_response("기침은 언제부터 시작됐나요?")
        .with_response("잠시만요");
    let analysis = MockAIProvider::new()
        .with_response(present_analysis())
        .with_response(present_analysis());
    let h = harness(questions, analysis, Duration::from_secs(2));

    say(&h.router, "기침이 심해요").await;
    say(&h.router, "분석").await;
    say(&h.router, "네").await;
    let job = h.queue.pending_jobs().await.remove(0);

    // At-least-once: the same job shows up again.
    h.queue.enqueue(&job).await.unwrap();

    assert_eq!(h.dispatcher.poll_once().await.unwrap(), PollOutcome::Delivered);
    let first = h.store.get(&user()).await.unwrap().unwrap();
    assert_eq!(h.dispatcher.poll_once().await.unwrap(), PollOutcome::Delivered);
    let second = h.store.get(&user()).await.unwrap().unwrap();

    assert_eq!(first.state, IntakeState::PostAnalysis);
    assert_eq!(first.state, second.state);
    assert_eq!(first.history, second.history);
    assert_eq!(first.extracted_data, second.extracted_data);
    assert_eq!(first.last_judgement, second.last_judgement);
    assert_eq!(h.callback.delivery_count().await, 2);
}

#[tokio::test]
async fn enqueue_failure_rolls_back_to_collecting() {
    let questions = MockAIProvider::new().with_response("기침은 언제부터 시작됐나요?");
    let h = harness(questions, MockAIProvider::new(), Duration::from_secs(2));

    say(&h.router, "기침이 심해요").await;
    say(&h.router, "분석").await;
    h.queue.set_fail_enqueue(true);

    let (status, envelope) = say(&h.router, "네").await;

    assert_eq!(status, StatusCode::OK);
    assert!(envelope.get("useCallback").is_none());
    let record = h.store.get(&user()).await.unwrap().unwrap();
    assert_eq!(record.state, IntakeState::Collecting);
}

#[tokio::test]
async fn failed_analysis_still_calls_back_once() {
    let questions = MockAIProvider::new()
        .with_response("기침은 언제부터 시작됐나요?")
        .with_response("잠시만요");
    let analysis = MockAIProvider::new().with_response("not json at all");
    let h = harness(questions, analysis, Duration::from_secs(2));

    say(&h.router, "기침이 심해요").await;
    say(&h.router, "분석").await;
    say(&h.router, "네").await;

    // The endpoint answers 200 even though the analysis failed.
    assert_eq!(h.dispatcher.poll_once().await.unwrap(), PollOutcome::Delivered);

    let deliveries = h.callback.deliveries().await;
    assert_eq!(deliveries.len(), 1);
    assert!(matches!(deliveries[0].reply, Reply::Text { .. }));
    let record = h.store.get(&user()).await.unwrap().unwrap();
    assert_eq!(record.state, IntakeState::ConfirmAnalysis);
    assert!(h.queue.pending_jobs().await.is_empty());
}
