//! penai HTTP server binary.
//!
//! Boots the answer pipeline (knowledge store, static table, providers,
//! session registry) and serves the assistant routes.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 5001)
//! - `OPENAI_API_KEY` — enables the retrieval tier and voice sessions
//! - `KNOWLEDGE_PATH` — knowledge JSONL (default: kb_chunks/kb_chunks.jsonl)
//! - `OPEN_DAYS_CACHE` — open-days cache file (default: /tmp/open_days.json)
//! - `DATABASE_URL` — CRM postgres (requires the `postgres` feature)
//! - `RUST_LOG` — tracing filter (default: "info,penai=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! # or with the CRM directory:
//! cargo run --bin server --features postgres
//! ```

use std::sync::Arc;
use std::time::Duration;

use penai::config::AppConfig;
use penai::conversation::registry::SessionRegistry;
use penai::enhancer::ResponseEnhancer;
use penai::events::OpenDaysCache;
use penai::family::NoFamilyDirectory;
use penai::knowledge::KnowledgeStore;
use penai::pipeline::{AnswerPipeline, PipelineDeps};
use penai::providers::openai::OpenAiClient;
use penai::providers::translate::LlmTranslator;
use penai::providers::FamilyDirectory;
use penai::retrieval::VectorRetriever;
use penai::server::{app_router, AppState};
use penai::staticqa::StaticAnswerTable;

/// Minutes between tracker-eviction sweeps.
const EVICTION_SWEEP_MINUTES: u64 = 15;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,penai=debug".into()),
        )
        .init();

    let config = Arc::new(AppConfig::from_env());
    let bind_addr = format!("0.0.0.0:{}", config.port);

    let store = Arc::new(
        KnowledgeStore::load_jsonl(&config.knowledge_path)
            .expect("Failed to load knowledge store"),
    );
    let table = Arc::new(StaticAnswerTable::load_default());
    tracing::info!(
        "loaded {} knowledge passages (dim {:?}) and {} static entries",
        store.len(),
        store.dim(),
        table.len()
    );

    let openai = Arc::new(
        OpenAiClient::new(config.openai.clone()).expect("Failed to build OpenAI client"),
    );
    if config.openai.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set — retrieval tier and voice sessions are disabled");
    }

    let registry = Arc::new(SessionRegistry::new());
    let events_cache = Arc::new(OpenDaysCache::new(config.open_days_cache.clone()));
    let families = build_family_directory(&config).await;

    let pipeline = AnswerPipeline::new(PipelineDeps {
        table,
        store: store.clone(),
        retriever: VectorRetriever::new(store, openai.clone()),
        registry: registry.clone(),
        enhancer: ResponseEnhancer::with_cadence(config.handoff_cadence),
        llm: openai.clone(),
        translator: Arc::new(LlmTranslator::new(openai)),
        events: events_cache.clone(),
        families: families.clone(),
    });

    // Tracker eviction sweep — the registry must not grow without bound.
    {
        let registry = registry.clone();
        let ttl = chrono::Duration::minutes(config.session_ttl_minutes);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(EVICTION_SWEEP_MINUTES * 60));
            loop {
                interval.tick().await;
                registry.purge_expired(ttl);
            }
        });
    }

    let http = reqwest::Client::builder()
        .timeout(config.openai.request_timeout)
        .build()
        .expect("Failed to build HTTP client");

    let state = AppState {
        pipeline: Arc::new(pipeline),
        registry,
        events_cache,
        families,
        config: config.clone(),
        http,
    };
    let app = app_router(state);

    tracing::info!("penai server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health        — liveness probe");
    tracing::info!("  POST /ask           — resolve a question");
    tracing::info!("  GET  /open-days     — cached open events");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .await
        .expect("Server failed");
}

/// Postgres-backed family directory when configured, no-op otherwise.
async fn build_family_directory(config: &AppConfig) -> Arc<dyn FamilyDirectory> {
    #[cfg(feature = "postgres")]
    {
        if let Some(database_url) = &config.database_url {
            match penai::family::pg::PgFamilyDirectory::connect(database_url).await {
                Ok(directory) => {
                    tracing::info!("family directory connected to postgres");
                    return Arc::new(directory);
                }
                Err(e) => {
                    tracing::error!("postgres connection failed, family lookups disabled: {e}");
                }
            }
        } else {
            tracing::warn!("DATABASE_URL not set, family lookups disabled");
        }
    }
    #[cfg(not(feature = "postgres"))]
    {
        if config.database_url.is_some() {
            tracing::warn!("DATABASE_URL set but the postgres feature is off");
        }
    }

    Arc::new(NoFamilyDirectory)
}
