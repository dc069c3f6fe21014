//! Axum route handlers for the assistant backend.
//!
//! The handlers are deliberately thin: request parsing, one call into the
//! pipeline or registry, response shaping. Everything interesting happens in
//! the core modules.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::conversation::registry::SessionRegistry;
use crate::events::{extract_events_from_html, OpenDayEvent, OpenDaysCache, OpenDaysPayload, OPEN_DAYS_URL};
use crate::family::InteractionLog;
use crate::pipeline::AnswerPipeline;
use crate::providers::{FamilyDirectory, ProviderError};
use crate::suggestions::get_suggestions;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The tiered answer pipeline.
    pub pipeline: Arc<AnswerPipeline>,
    /// Session registry, shared with the pipeline.
    pub registry: Arc<SessionRegistry>,
    /// Open-days cache, read by `/open-days` and written by the refresh task.
    pub events_cache: Arc<OpenDaysCache>,
    /// Family directory for the `/family` route and interaction logging.
    pub families: Arc<dyn FamilyDirectory>,
    /// Service configuration.
    pub config: Arc<AppConfig>,
    /// Outbound HTTP client for the refresh task and voice sessions.
    pub http: reqwest::Client,
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route("/open-days", get(open_days_handler))
        .route("/tasks/refresh-open-days", post(refresh_open_days_handler))
        .route("/conversation/:session_id", get(conversation_handler))
        .route("/family/:family_id", get(family_handler))
        .route("/realtime/session", post(realtime_session_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "penai",
    }))
}

// ---------------------------------------------------------------------------
// /ask
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub family_id: Option<String>,
    /// Present for voice sessions; binds the request to a tracker.
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub url: Option<String>,
    pub link_label: Option<String>,
    pub queries: Vec<String>,
    pub query_map: std::collections::HashMap<String, String>,
    pub source: crate::pipeline::AnswerSource,
    pub family_used: bool,
    pub session_id: Option<String>,
}

/// POST /ask — resolve a question through the pipeline.
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Json<AskResponse> {
    let resolution = state
        .pipeline
        .resolve(
            &request.question,
            &request.language,
            request.session_id.as_deref(),
            request.family_id.as_deref(),
        )
        .await;

    // Dashboard logging is best-effort and never blocks the answer.
    if let Some(family_id) = request.family_id.as_deref() {
        let (sentiment, high_intent) = request
            .session_id
            .as_deref()
            .and_then(|sid| state.registry.get(sid))
            .map(|tracker| {
                let t = tracker.lock();
                (t.emotional_state().as_str().to_string(), t.high_intent_signals() > 0)
            })
            .unwrap_or_else(|| ("neutral".to_string(), false));

        let log = InteractionLog {
            source: serde_json::to_value(resolution.source)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            topic: resolution.matched_key.clone(),
            sentiment,
            session_id: request.session_id.clone(),
            high_intent,
        };
        if let Err(e) = state
            .families
            .log_interaction(family_id, &request.question, &resolution.answer, &log)
            .await
        {
            log::debug!("interaction logging skipped: {e}");
        }
    }

    let suggestions = get_suggestions(
        resolution.matched_key.as_deref().unwrap_or(&request.question),
        &request.language,
    );
    let queries = suggestions.iter().map(|s| s.query.clone()).collect();
    let query_map = suggestions
        .into_iter()
        .map(|s| (s.query, s.label))
        .collect();

    Json(AskResponse {
        answer: resolution.answer,
        url: resolution.url,
        link_label: resolution.label,
        queries,
        query_map,
        source: resolution.source,
        family_used: request.family_id.is_some(),
        session_id: request.session_id,
    })
}

// ---------------------------------------------------------------------------
// Open days
// ---------------------------------------------------------------------------

/// GET /open-days — dump the cached payload.
async fn open_days_handler(State(state): State<AppState>) -> Json<OpenDaysPayload> {
    Json(state.events_cache.read())
}

/// POST /tasks/refresh-open-days — fetch the public page and rebuild the
/// cache. Guarded by the `X-Refresh-Secret` header.
async fn refresh_open_days_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let supplied = headers
        .get("x-refresh-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if supplied != state.config.refresh_secret {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": "unauthorised"})),
        ));
    }

    let html = state
        .http
        .get(OPEN_DAYS_URL)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"ok": false, "error": format!("fetch failed: {e}")})),
            )
        })?
        .text()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"ok": false, "error": format!("read failed: {e}")})),
            )
        })?;

    let events = extract_events_from_html(&html, Utc::now().date_naive());
    let payload = OpenDaysPayload {
        source_url: OPEN_DAYS_URL.to_string(),
        last_checked: Some(Utc::now().to_rfc3339()),
        events,
    };
    state.events_cache.write(&payload).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"ok": false, "error": format!("cache write failed: {e}")})),
        )
    })?;

    Ok(Json(serde_json::json!({"ok": true, "count": payload.events.len()})))
}

// ---------------------------------------------------------------------------
// Conversation + family
// ---------------------------------------------------------------------------

/// GET /conversation/:session_id — summary for the admissions dashboard.
async fn conversation_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(tracker) = state.registry.get(&session_id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"ok": false, "error": "Session not found"})),
        ));
    };

    let (summary, should_handoff) = {
        let t = tracker.lock();
        (t.summary(), t.should_offer_human_handoff())
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "summary": summary,
        "should_handoff": should_handoff,
    })))
}

/// GET /family/:family_id — profile lookup.
async fn family_handler(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.families.get_family(&family_id).await {
        Ok(Some(family)) => Ok(Json(serde_json::json!({"ok": true, "family": family}))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"ok": false, "error": "Family not found"})),
        )),
        Err(ProviderError::NotConfigured(_)) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ok": false, "error": "Database not configured"})),
        )),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        )),
    }
}

// ---------------------------------------------------------------------------
// Realtime voice sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RealtimeSessionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub family_id: Option<String>,
}

/// POST /realtime/session — register a tracker and open a provider voice
/// session with the composed persona instructions.
async fn realtime_session_handler(
    State(state): State<AppState>,
    Json(request): Json<RealtimeSessionRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if state.config.openai.api_key.is_empty() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"ok": false, "error": "OPENAI_API_KEY not set"})),
        ));
    }

    let session_id = Uuid::new_v4().to_string();
    state
        .registry
        .get_or_create(&session_id, request.family_id.as_deref());

    let language = request
        .language
        .as_deref()
        .unwrap_or("en")
        .trim()
        .to_lowercase();
    let events = state.events_cache.read().events;
    let instructions = build_voice_instructions(&language, &events, &session_id);

    let model = request
        .model
        .unwrap_or_else(|| state.config.realtime_model.clone());
    let voice = request
        .voice
        .unwrap_or_else(|| state.config.realtime_voice.clone());

    let body = serde_json::json!({
        "model": model,
        "voice": voice,
        "modalities": ["text", "audio"],
        "output_audio_format": "pcm16",
        "temperature": 0.6,
        "max_response_output_tokens": 1500,
        "turn_detection": {
            "type": "server_vad",
            "threshold": 0.5,
            "prefix_padding_ms": 300,
            "silence_duration_ms": 1000,
        },
        "instructions": instructions,
    });

    let response = state
        .http
        .post(format!("{}/realtime/sessions", state.config.openai.api_base))
        .bearer_auth(&state.config.openai.api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            )
        })?;

    let mut session: Value = response.json().await.map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        )
    })?;

    // Hand the tracker's id back so the widget can thread it through /ask.
    if let Some(obj) = session.as_object_mut() {
        obj.insert("session_id".to_string(), Value::String(session_id));
    }
    Ok(Json(session))
}

/// Compose the voice persona instructions for a new session.
fn build_voice_instructions(language: &str, events: &[OpenDayEvent], session_id: &str) -> String {
    let events_digest = if events.is_empty() {
        "No upcoming Open Days are currently listed. ".to_string()
    } else {
        let listed: Vec<String> = events
            .iter()
            .map(|e| format!("{} on {}", e.event_name, e.date_human))
            .collect();
        format!("Upcoming Open Days: {}. ", listed.join("; "))
    };

    format!(
        "{events_digest}\
         PRIMARY LANGUAGE: {language}. Always speak and respond in this language unless the user \
         explicitly switches. \
         You are Emily, a warm and knowledgeable admissions advisor for Cheltenham College, a \
         leading co-educational independent boarding and day school in Cheltenham, Gloucestershire. \
         Speak clear British English at a measured pace; warm and professional, never salesy. \
         Keep responses concise but complete, two to three sentences per turn, and always finish \
         your thoughts before pausing. \
         When asked about open days, visits, or tours, use only the listed events above; never \
         guess dates. \
         Structure each reply: acknowledge the question, give the key information, then ask one \
         follow-up question if appropriate. \
         If you are unsure, never stay silent; offer to check with the admissions team instead. \
         Session ID: {session_id}. Remember what was discussed earlier and reference it naturally."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::registry::SessionRegistry;
    use crate::enhancer::ResponseEnhancer;
    use crate::knowledge::KnowledgeStore;
    use crate::pipeline::{AnswerPipeline, PipelineDeps};
    use crate::providers::openai::OpenAiConfig;
    use crate::providers::{
        EmbeddingProvider, GenerativeProvider, OpenEventsFeed, Translator,
    };
    use crate::retrieval::VectorRetriever;
    use crate::staticqa::StaticAnswerTable;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct Unavailable;

    #[async_trait]
    impl EmbeddingProvider for Unavailable {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::NotConfigured("test".into()))
        }
    }

    #[async_trait]
    impl GenerativeProvider for Unavailable {
        async fn complete(
            &self,
            _persona: &str,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, ProviderError> {
            Err(ProviderError::NotConfigured("test".into()))
        }
    }

    #[async_trait]
    impl Translator for Unavailable {
        async fn translate(&self, text: &str, _target: &str) -> Result<String, ProviderError> {
            Ok(text.to_string())
        }
    }

    fn test_state(events_dir: &std::path::Path) -> AppState {
        let store = Arc::new(KnowledgeStore::empty());
        let registry = Arc::new(SessionRegistry::new());
        let events_cache = Arc::new(OpenDaysCache::new(events_dir.join("open_days.json")));
        let families: Arc<dyn FamilyDirectory> = Arc::new(crate::family::NoFamilyDirectory);

        let pipeline = AnswerPipeline::new(PipelineDeps {
            table: Arc::new(StaticAnswerTable::load_default()),
            store: store.clone(),
            retriever: VectorRetriever::new(store, Arc::new(Unavailable)),
            registry: registry.clone(),
            enhancer: ResponseEnhancer::new(),
            llm: Arc::new(Unavailable),
            translator: Arc::new(Unavailable),
            events: events_cache.clone(),
            families: families.clone(),
        });

        let mut config = AppConfig::from_env();
        config.openai = OpenAiConfig::default();
        config.refresh_secret = "test-secret".to_string();

        AppState {
            pipeline: Arc::new(pipeline),
            registry,
            events_cache,
            families,
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_router(test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "penai");
    }

    #[tokio::test]
    async fn test_ask_route_static_match() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_router(test_state(dir.path()));

        let request = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question": "fees", "language": "en"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["source"], "static");
        assert!(json["answer"].as_str().unwrap().contains("fees"));
        assert_eq!(json["family_used"], false);
        assert!(!json["queries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_route_open_days_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_router(test_state(dir.path()));

        let request = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question": "when is the next open day"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let json = body_json(response).await;
        assert_eq!(json["source"], "open_days");
        assert!(json["answer"].as_str().unwrap().contains("check back soon"));
    }

    #[tokio::test]
    async fn test_conversation_route_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/conversation/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conversation_route_after_voice_ask() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = app_router(state.clone());

        let ask = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"question": "how do i apply", "session_id": "s-dash"}"#,
            ))
            .unwrap();
        app.clone().oneshot(ask).await.unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/conversation/s-dash")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["summary"]["interaction_count"], 1);
    }

    #[tokio::test]
    async fn test_refresh_requires_secret() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tasks/refresh-open-days")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_family_route_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/family/fam-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_voice_instructions_include_events_and_language() {
        let events = vec![OpenDayEvent {
            event_name: "Open Morning".into(),
            date_iso: "2025-11-08".into(),
            date_human: "Saturday 8 November 2025".into(),
            booking_link: OPEN_DAYS_URL.into(),
        }];
        let text = build_voice_instructions("fr", &events, "sess-1");
        assert!(text.contains("Open Morning on Saturday 8 November 2025"));
        assert!(text.contains("PRIMARY LANGUAGE: fr"));
        assert!(text.contains("sess-1"));

        let empty = build_voice_instructions("en", &[], "sess-2");
        assert!(empty.starts_with("No upcoming Open Days"));
    }
}
