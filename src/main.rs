//! Asthma Intake server binary.
//!
//! Wires the Redis store and queue, the PostgreSQL archive and the model
//! providers into the skill router, and runs the analysis dispatcher
//! next to it until Ctrl+C.

use std::error::Error;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use asthma_intake::adapters::ai::{
    GeminiConfig, GeminiProvider, LlmIntakeAssistant, OpenAIConfig, OpenAIProvider,
};
use asthma_intake::adapters::archive::PostgresArchiveWriter;
use asthma_intake::adapters::callback::HttpCallbackSender;
use asthma_intake::adapters::http::{skill_routes, SkillHandlers};
use asthma_intake::adapters::queue::{
    AnalysisDispatcher, AnalysisDispatcherConfig, HttpJobTarget, RedisAnalysisQueue,
};
use asthma_intake::adapters::storage::RedisConversationStore;
use asthma_intake::application::{HandleUtteranceHandler, ProcessAnalysisHandler};
use asthma_intake::config::{AiConfig, AiProvider, AppConfig, ServerConfig};
use asthma_intake::ports::{AIError, AIProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    // Model providers
    let assistant = Arc::new(
        LlmIntakeAssistant::new(
            build_provider(&config.ai, config.ai.question_model())?,
            build_provider(&config.ai, config.ai.analysis_model())?,
        )
        .with_turn_deadline(config.ai.turn_deadline())
        .with_wait_message_deadline(config.ai.wait_message_deadline()),
    );

    // Redis: one multiplexed connection for request traffic. The dispatcher
    // gets its own pair, one of them reserved for the blocking reserve.
    let redis = redis::Client::open(config.redis.url.as_str())?;
    let request_conn = redis.get_multiplexed_tokio_connection().await?;
    let store = Arc::new(
        RedisConversationStore::new(request_conn.clone(), config.redis.key_prefix.clone())
            .with_ttl_secs(config.redis.record_ttl_secs),
    );
    let queue = Arc::new(RedisAnalysisQueue::new(request_conn, config.queue.name.clone()));

    // Archive
    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }
    let archive = Arc::new(PostgresArchiveWriter::new(pool, &config.database.archive_table)?);

    let callback = Arc::new(HttpCallbackSender::new(config.server.request_timeout())?);

    let handlers = SkillHandlers::new(
        Arc::new(HandleUtteranceHandler::new(
            store.clone(),
            assistant.clone(),
            queue,
            archive,
        )),
        Arc::new(ProcessAnalysisHandler::new(
            store,
            assistant,
            callback,
            config.skill.card_images(),
        )),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_task = if config.queue.dispatcher_enabled {
        let settle_conn = redis.get_multiplexed_tokio_connection().await?;
        let reserve_conn = redis.get_multiplexed_tokio_connection().await?;
        let dispatcher = AnalysisDispatcher::new(
            Arc::new(
                RedisAnalysisQueue::new(settle_conn, config.queue.name.clone())
                    .with_blocking_connection(reserve_conn),
            ),
            Arc::new(HttpJobTarget::new(
                &config.queue.callback_base_url,
                config.queue.delivery_timeout(),
            )?),
            AnalysisDispatcherConfig::default()
                .with_poll_timeout(config.queue.poll_timeout())
                .with_max_attempts(config.queue.max_attempts)
                .with_retry_backoff(config.queue.retry_backoff())
                .with_max_in_flight(config.queue.max_in_flight),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = dispatcher.run(shutdown_rx).await {
                tracing::error!(error = %e, "analysis dispatcher stopped with error");
            }
        }))
    } else {
        tracing::info!("analysis dispatcher disabled in this process");
        None
    };

    let app = skill_routes(handlers, config.server.request_timeout())
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "asthma intake bot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // A send error only means the dispatcher is already gone.
    let _ = shutdown_tx.send(true);
    if let Some(task) = dispatcher_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "analysis dispatcher task panicked");
        }
    }

    tracing::info!("asthma intake bot stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if server.is_production() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn build_provider(ai: &AiConfig, model: &str) -> Result<Arc<dyn AIProvider>, AIError> {
    let provider: Arc<dyn AIProvider> = match ai.provider {
        AiProvider::Gemini => {
            let project = ai.gcp_project_id.clone().unwrap_or_default();
            let mut gemini = GeminiConfig::new(project, ai.region.clone())
                .with_model(model)
                .with_timeout(ai.request_timeout())
                .with_max_retries(ai.max_retries);
            if let Some(token) = &ai.access_token {
                gemini = gemini.with_access_token(token.clone());
            }
            Arc::new(GeminiProvider::new(gemini)?)
        }
        AiProvider::OpenAI => {
            let key = ai.openai_api_key.clone().unwrap_or_default();
            let openai = OpenAIConfig::new(key)
                .with_model(model)
                .with_timeout(ai.request_timeout())
                .with_max_retries(ai.max_retries);
            Arc::new(OpenAIProvider::new(openai)?)
        }
    };

    let info = provider.provider_info();
    tracing::info!(provider = %info.name, model = %info.model, "model provider ready");
    Ok(provider)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
