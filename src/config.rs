//! Environment-driven service configuration.

use std::path::PathBuf;

use crate::providers::openai::OpenAiConfig;

/// Top-level configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP port.
    pub port: u16,
    /// OpenAI client settings (key, models, timeout).
    pub openai: OpenAiConfig,
    /// JSON Lines knowledge base produced by the offline embedding job.
    pub knowledge_path: PathBuf,
    /// JSON cache the open-days refresh task writes.
    pub open_days_cache: PathBuf,
    /// Shared secret guarding the refresh endpoint.
    pub refresh_secret: String,
    /// Idle minutes before a conversation tracker is evicted.
    pub session_ttl_minutes: i64,
    /// Offer human handoff every Nth interaction.
    pub handoff_cadence: usize,
    /// Realtime voice model.
    pub realtime_model: String,
    /// Realtime voice id.
    pub realtime_voice: String,
    /// CRM database, when the postgres feature is active.
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Load from environment variables, with workable local defaults.
    ///
    /// # Environment Variables
    ///
    /// - `PORT` — HTTP port (default: 5001)
    /// - `KNOWLEDGE_PATH` — knowledge JSONL (default: kb_chunks/kb_chunks.jsonl)
    /// - `OPEN_DAYS_CACHE` — cache file (default: /tmp/open_days.json)
    /// - `OPEN_DAYS_REFRESH_SECRET` — refresh guard (default: change-me)
    /// - `SESSION_TTL_MINUTES` — tracker eviction (default: 240)
    /// - `HANDOFF_CADENCE` — handoff offer cadence (default: 5)
    /// - `REALTIME_MODEL` / `REALTIME_VOICE` — voice session defaults
    /// - `DATABASE_URL` — CRM postgres connection string
    /// - plus the `OPENAI_*` variables of [`OpenAiConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 5001),
            openai: OpenAiConfig::from_env(),
            knowledge_path: std::env::var("KNOWLEDGE_PATH")
                .unwrap_or_else(|_| "kb_chunks/kb_chunks.jsonl".into())
                .into(),
            open_days_cache: std::env::var("OPEN_DAYS_CACHE")
                .unwrap_or_else(|_| "/tmp/open_days.json".into())
                .into(),
            refresh_secret: std::env::var("OPEN_DAYS_REFRESH_SECRET")
                .unwrap_or_else(|_| "change-me".into()),
            session_ttl_minutes: env_parse("SESSION_TTL_MINUTES", 240),
            handoff_cadence: env_parse("HANDOFF_CADENCE", 5),
            realtime_model: std::env::var("REALTIME_MODEL")
                .unwrap_or_else(|_| "gpt-4o-realtime-preview".into()),
            realtime_voice: std::env::var("REALTIME_VOICE").unwrap_or_else(|_| "shimmer".into()),
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
