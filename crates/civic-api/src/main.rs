//! civic-api - HTTP API server for civic-research

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civic_agent::{AgentConfig, ResearchAgent, ToolRegistry};
use civic_api::services::SearchCache;
use civic_api::AppState;
use civic_core::{defaults, EmbeddingBackend, ResearchBackend};
use civic_db::{Database, PoolConfig};
use civic_inference::OpenAIBackend;
use civic_search::{HybridSearchConfig, HybridSearchEngine, QueryEmbedder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "civic_api=debug,civic_agent=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "civic_api=debug,civic_agent=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("civic-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/civic".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let embeddings_enabled = std::env::var("EMBEDDINGS_ENABLED")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    db.migrate().await?;
    info!("Database connected, migrations applied");

    let housekeeping_secs = std::env::var("HOUSEKEEPING_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|secs: &u64| *secs > 0)
        .unwrap_or(defaults::HOUSEKEEPING_INTERVAL_SECS);
    let housekeeping_db = db.clone();
    tokio::spawn(async move {
        run_housekeeping(housekeeping_db, housekeeping_secs).await;
    });

    let llm = Arc::new(OpenAIBackend::from_env()?);
    info!(
        base_url = %llm.config().base_url,
        gen_model = %llm.config().gen_model,
        "Inference backend configured"
    );

    let embedder = if embeddings_enabled {
        QueryEmbedder::new(llm.clone() as Arc<dyn EmbeddingBackend>)
    } else {
        warn!("Query embeddings disabled via EMBEDDINGS_ENABLED, using full-text only");
        QueryEmbedder::disabled()
    };

    let search = Arc::new(
        HybridSearchEngine::new(Arc::new(db.search.clone()), embedder)
            .with_config(HybridSearchConfig::from_env()),
    );
    let records = Arc::new(db.records.clone());
    let answers = Arc::new(db.answers.clone());

    let agent_config = AgentConfig::from_env();
    info!(
        max_steps = agent_config.max_steps,
        call_timeout_secs = agent_config.call_timeout.as_secs(),
        "Research agent configured"
    );
    let agent = ResearchAgent::new(
        llm as Arc<dyn ResearchBackend>,
        ToolRegistry::civic(search.clone(), records),
    )
    .with_config(agent_config)
    .with_answer_store(answers.clone());

    let state = AppState::new(search, Arc::new(agent), answers)
        .with_search_cache(SearchCache::from_env().await);

    let app = civic_api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically purge expired cached answers and log pool occupancy.
async fn run_housekeeping(db: Database, interval_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        if let Err(e) = db.housekeeping().await {
            warn!(error = %e, "Database housekeeping failed");
        }
    }
}
