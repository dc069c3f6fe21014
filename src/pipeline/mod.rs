//! The tiered answer-resolution pipeline.
//!
//! Tiers run in strict priority order, first success wins:
//!
//! 1. Open-days intent shortcut — answered from the events feed.
//! 2. Exact static match against the curated table.
//! 3. Fuzzy static match (ratio strictly above 0.8).
//! 4. Vector retrieval + generative summarization over the knowledge base.
//! 5. A scripted no-match answer offering human handoff.
//!
//! Every tier records exactly one interaction on the session's tracker
//! before returning. Voice sessions (requests carrying a session id) get the
//! answer rewritten by the response enhancer — except tier 1, whose phrasing
//! is already scripted. Trackers always store the pre-enhancement text so
//! future retrieval prompts see facts, not conversational filler.
//!
//! External-collaborator failures never surface to the caller: a failed
//! translation keeps the original text, a failed retrieval or generation
//! falls through to the next tier.

pub mod format;
pub mod links;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::conversation::registry::{SessionRegistry, TrackerHandle};
use crate::conversation::{ConversationTracker, Interaction};
use crate::enhancer::ResponseEnhancer;
use crate::events::{self, OPEN_DAYS_URL};
use crate::knowledge::KnowledgeStore;
use crate::matching::keywords;
use crate::providers::{
    FamilyDirectory, GenerativeProvider, OpenEventsFeed, ProviderError, Translator,
};
use crate::retrieval::VectorRetriever;
use crate::staticqa::StaticAnswerTable;

/// Language the static table is authored in; non-pivot questions are
/// translated before static matching.
pub const PIVOT_LANGUAGE: &str = "en";

/// Fuzzy tier acceptance threshold (strict greater-than).
pub const FUZZY_ACCEPT_THRESHOLD: f64 = 0.8;

/// Passages fed to the generative fallback.
const RETRIEVAL_TOP_K: usize = 10;

/// Interactions included as prompt context.
const PROMPT_CONTEXT_TURNS: usize = 3;

/// Context questions are clipped to this many characters in the prompt.
const PROMPT_QUESTION_CLIP: usize = 50;

/// Generation temperature; low to favour determinism over flair.
const GENERATION_TEMPERATURE: f32 = 0.3;

/// System persona for the generative fallback.
const ASSISTANT_PERSONA: &str =
    "You are a warm, helpful British school assistant. Be conversational.";

const NO_MATCH_ANSWER: &str = "I'm sorry, I don't have that specific information to hand. \
                               Would you like me to connect you with our admissions team who can help?";

/// Which tier produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    OpenDays,
    Static,
    Fuzzy,
    Rag,
    None,
}

/// A resolved answer plus its link metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub answer: String,
    pub url: Option<String>,
    pub label: Option<String>,
    pub matched_key: Option<String>,
    pub source: AnswerSource,
}

/// Everything the pipeline needs, injected rather than ambient.
pub struct PipelineDeps {
    pub table: Arc<StaticAnswerTable>,
    pub store: Arc<KnowledgeStore>,
    pub retriever: VectorRetriever,
    pub registry: Arc<SessionRegistry>,
    pub enhancer: ResponseEnhancer,
    pub llm: Arc<dyn GenerativeProvider>,
    pub translator: Arc<dyn Translator>,
    pub events: Arc<dyn OpenEventsFeed>,
    pub families: Arc<dyn FamilyDirectory>,
}

/// The tiered matcher.
pub struct AnswerPipeline {
    deps: PipelineDeps,
}

impl AnswerPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Resolve one question through the tiers.
    ///
    /// A supplied `session_id` binds the request to a registered tracker
    /// (created on first use) and turns on voice enhancement; without one an
    /// ephemeral tracker records the interaction and is dropped.
    pub async fn resolve(
        &self,
        question: &str,
        language: &str,
        session_id: Option<&str>,
        family_id: Option<&str>,
    ) -> Resolution {
        let question_lower = question.trim().to_lowercase();

        // Static matching runs against the pivot language; translation
        // failure falls back to the original text.
        let question_for_match = if language != PIVOT_LANGUAGE {
            match self.deps.translator.translate(question, PIVOT_LANGUAGE).await {
                Ok(translated) => translated.trim().to_lowercase(),
                Err(e) => {
                    log::warn!("translate-to-pivot failed, matching original text: {e}");
                    question_lower.clone()
                }
            }
        } else {
            question_lower.clone()
        };

        log::debug!(
            "resolving question (lang: {language}, session: {session_id:?}): {question_lower}"
        );

        let tracker = self.resolve_tracker(session_id, family_id);

        // Tier 1: open-days shortcut.
        if keywords::mentions_open_day(&question_lower) {
            return self.answer_open_days(question, &tracker).await;
        }

        // Tier 2: exact static match.
        if let Some(entry) = self.deps.table.exact_match(&question_for_match, language) {
            log::debug!("exact match on '{}'", entry.key);
            return self
                .answer_static(question, entry.clone(), AnswerSource::Static, session_id, family_id, &tracker)
                .await;
        }

        // Tier 3: fuzzy static match.
        if let Some((entry, score)) = self.deps.table.best_fuzzy_match(&question_for_match, language)
        {
            if score > FUZZY_ACCEPT_THRESHOLD {
                log::debug!("fuzzy match on '{}' (score {score:.2})", entry.key);
                return self
                    .answer_static(question, entry.clone(), AnswerSource::Fuzzy, session_id, family_id, &tracker)
                    .await;
            }
        }

        // Tier 4: retrieval + generative fallback.
        if let Some(resolution) = self
            .answer_from_retrieval(question, &question_lower, language, session_id, family_id, &tracker)
            .await
        {
            return resolution;
        }

        // Tier 5: no match.
        log::debug!("no suitable match found");
        {
            tracker
                .lock()
                .record_interaction(question, NO_MATCH_ANSWER, Some("unknown"));
        }
        let answer = self
            .maybe_enhance(NO_MATCH_ANSWER.to_string(), session_id, family_id, &tracker)
            .await;

        Resolution {
            answer,
            url: None,
            label: None,
            matched_key: None,
            source: AnswerSource::None,
        }
    }

    /// Registered tracker for voice sessions, ephemeral otherwise.
    fn resolve_tracker(&self, session_id: Option<&str>, family_id: Option<&str>) -> TrackerHandle {
        match session_id {
            Some(id) => self.deps.registry.get_or_create(id, family_id),
            None => Arc::new(parking_lot::Mutex::new(ConversationTracker::new(
                Uuid::new_v4().to_string(),
                family_id.map(str::to_string),
            ))),
        }
    }

    /// Tier 1: answer from the open-events feed. Scripted, never enhanced.
    async fn answer_open_days(&self, question: &str, tracker: &TrackerHandle) -> Resolution {
        let events = match self.deps.events.list_events().await {
            Ok(events) => events,
            Err(e) => {
                log::warn!("open-events feed unavailable: {e}");
                Vec::new()
            }
        };

        let resolution = match events::next_upcoming(&events) {
            Some(next) => Resolution {
                answer: format!(
                    "Our next {} is on {}. You can find more details and register here: {}",
                    next.event_name, next.date_human, next.booking_link
                ),
                url: Some(next.booking_link.clone()),
                label: Some("Open Days".to_string()),
                matched_key: Some("open_days".to_string()),
                source: AnswerSource::OpenDays,
            },
            None => Resolution {
                answer: format!(
                    "We don't currently have any upcoming Open Days listed. \
                     You can check back soon on our Admissions page at {OPEN_DAYS_URL}"
                ),
                url: Some(OPEN_DAYS_URL.to_string()),
                label: Some("Admissions".to_string()),
                matched_key: Some("open_days".to_string()),
                source: AnswerSource::OpenDays,
            },
        };

        tracker
            .lock()
            .record_interaction(question, &resolution.answer, Some("open_days"));
        resolution
    }

    /// Tiers 2 and 3: answer from a static entry.
    async fn answer_static(
        &self,
        question: &str,
        entry: crate::staticqa::StaticAnswerEntry,
        source: AnswerSource,
        session_id: Option<&str>,
        family_id: Option<&str>,
        tracker: &TrackerHandle,
    ) -> Resolution {
        {
            tracker
                .lock()
                .record_interaction(question, &entry.answer, Some(entry.key.as_str()));
        }
        let answer = self
            .maybe_enhance(entry.answer.clone(), session_id, family_id, tracker)
            .await;

        Resolution {
            answer,
            url: entry.url,
            label: entry.label,
            matched_key: Some(entry.key),
            source,
        }
    }

    /// Tier 4: retrieval-grounded generation. `None` hands over to tier 5.
    async fn answer_from_retrieval(
        &self,
        question: &str,
        question_lower: &str,
        language: &str,
        session_id: Option<&str>,
        family_id: Option<&str>,
        tracker: &TrackerHandle,
    ) -> Option<Resolution> {
        let hits = self.deps.retriever.search(question, RETRIEVAL_TOP_K).await;
        if hits.is_empty() {
            return None;
        }
        log::debug!("vector match (cos {:.2}, {} passages)", hits[0].similarity, hits.len());

        let contexts: Vec<&str> = hits
            .iter()
            .filter_map(|hit| self.deps.store.passage(hit.index))
            .map(|p| p.text.as_str())
            .collect();

        let previous_context = {
            let t = tracker.lock();
            build_previous_context(t.recent_interactions(PROMPT_CONTEXT_TURNS))
        };
        let prompt = build_prompt(&previous_context, &contexts, question);

        let raw = match self
            .deps
            .llm
            .complete(ASSISTANT_PERSONA, &prompt, GENERATION_TEMPERATURE)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("generative fallback unavailable: {e}");
                return None;
            }
        };

        let clean = format::normalize_blank_lines(&format::remove_bullets(&raw));
        let detected_topic = keywords::detect_question_topic(question_lower);
        let formatted = format::apply_topic_template(detected_topic, &clean);

        let passage_url = self
            .deps
            .store
            .passage(hits[0].index)
            .map(|p| p.source_url.as_str());
        let (url, label) = links::link_for_topic(detected_topic, passage_url);

        {
            tracker
                .lock()
                .record_interaction(question, &formatted, Some("general"));
        }
        let mut answer = self.maybe_enhance(formatted, session_id, family_id, tracker).await;

        if language != PIVOT_LANGUAGE {
            match self.deps.translator.translate(&answer, language).await {
                Ok(translated) => answer = translated,
                Err(e) => {
                    log::warn!("answer translation failed, returning pivot-language text: {e}");
                }
            }
        }

        Some(Resolution {
            answer,
            url: Some(url),
            label: Some(label),
            matched_key: None,
            source: AnswerSource::Rag,
        })
    }

    /// Voice enhancement, applied only when the request carries a session id.
    async fn maybe_enhance(
        &self,
        raw: String,
        session_id: Option<&str>,
        family_id: Option<&str>,
        tracker: &TrackerHandle,
    ) -> String {
        if session_id.is_none() {
            return raw;
        }

        let family = match family_id {
            Some(id) => match self.deps.families.get_family(id).await {
                Ok(family) => family,
                Err(ProviderError::NotConfigured(_)) => None,
                Err(e) => {
                    log::warn!("family lookup failed for {id}: {e}");
                    None
                }
            },
            None => None,
        };

        let t = tracker.lock();
        self.deps.enhancer.enhance(&raw, &t, family.as_ref())
    }
}

/// "Previous context" line for the generative prompt.
fn build_previous_context(recent: &[Interaction]) -> String {
    if recent.is_empty() {
        return String::new();
    }

    let clipped: Vec<String> = recent
        .iter()
        .map(|i| format!("Q: {}", i.question.chars().take(PROMPT_QUESTION_CLIP).collect::<String>()))
        .collect();
    format!("Previous context: {}", clipped.join(" | "))
}

/// Grounded prompt: context, passages, then the question.
fn build_prompt(previous_context: &str, contexts: &[&str], question: &str) -> String {
    let mut prompt = String::new();
    if !previous_context.is_empty() {
        prompt.push_str(previous_context);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Use ONLY the passages below to answer.\n\n");
    prompt.push_str(&contexts.join("\n---\n"));
    prompt.push_str(&format!("\n\nQuestion: {question}\nAnswer:"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::OpenDayEvent;
    use crate::family::FamilyContext;
    use crate::knowledge::KnowledgePassage;
    use crate::providers::EmbeddingProvider;
    use crate::staticqa::StaticAnswerEntry;
    use async_trait::async_trait;

    // ── Test doubles ────────────────────────────────────────────────────

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    struct CannedLlm(&'static str);

    #[async_trait]
    impl GenerativeProvider for CannedLlm {
        async fn complete(
            &self,
            _persona: &str,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    struct DownLlm;

    #[async_trait]
    impl GenerativeProvider for DownLlm {
        async fn complete(
            &self,
            _persona: &str,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, ProviderError> {
            Err(ProviderError::Request("backend down".into()))
        }
    }

    struct IdentityTranslator;

    #[async_trait]
    impl Translator for IdentityTranslator {
        async fn translate(&self, text: &str, _target: &str) -> Result<String, ProviderError> {
            Ok(text.to_string())
        }
    }

    struct StaticFeed(Vec<OpenDayEvent>);

    #[async_trait]
    impl OpenEventsFeed for StaticFeed {
        async fn list_events(&self) -> Result<Vec<OpenDayEvent>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    struct NoFamilies;

    #[async_trait]
    impl FamilyDirectory for NoFamilies {
        async fn get_family(&self, _id: &str) -> Result<Option<FamilyContext>, ProviderError> {
            Ok(None)
        }
    }

    fn table() -> StaticAnswerTable {
        StaticAnswerTable::from_entries(vec![
            StaticAnswerEntry {
                key: "fees".to_string(),
                language: "en".to_string(),
                answer: "A".to_string(),
                variants: vec!["fees".to_string(), "tuition".to_string()],
                url: Some("https://example.org/fees".to_string()),
                label: Some("Fees".to_string()),
            },
            StaticAnswerEntry {
                key: "term dates".to_string(),
                language: "en".to_string(),
                answer: "Term dates are online.".to_string(),
                variants: vec!["term dates".to_string()],
                url: None,
                label: None,
            },
        ])
    }

    fn pipeline_with(
        store: Arc<KnowledgeStore>,
        llm: Arc<dyn GenerativeProvider>,
        feed: Arc<dyn OpenEventsFeed>,
    ) -> AnswerPipeline {
        let embedder = Arc::new(FixedEmbedder(vec![1.0, 0.0]));
        AnswerPipeline::new(PipelineDeps {
            table: Arc::new(table()),
            store: store.clone(),
            retriever: VectorRetriever::new(store, embedder),
            registry: Arc::new(SessionRegistry::new()),
            enhancer: ResponseEnhancer::new(),
            llm,
            translator: Arc::new(IdentityTranslator),
            events: feed,
            families: Arc::new(NoFamilies),
        })
    }

    fn empty_pipeline() -> AnswerPipeline {
        pipeline_with(
            Arc::new(KnowledgeStore::empty()),
            Arc::new(DownLlm),
            Arc::new(StaticFeed(Vec::new())),
        )
    }

    fn store_with_passage() -> Arc<KnowledgeStore> {
        Arc::new(KnowledgeStore::from_passages(vec![KnowledgePassage {
            text: "The swimming pool opens at 7am for seniors.".to_string(),
            embedding: vec![1.0, 0.0],
            source_url: "https://example.org/swimming".to_string(),
            source_label: None,
        }]))
    }

    // ── Tiers ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_exact_static_match_by_key() {
        let pipeline = empty_pipeline();
        let res = pipeline.resolve("Fees", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::Static);
        assert_eq!(res.answer, "A");
        assert_eq!(res.matched_key.as_deref(), Some("fees"));
        assert_eq!(res.url.as_deref(), Some("https://example.org/fees"));
        assert_eq!(res.label.as_deref(), Some("Fees"));
    }

    #[tokio::test]
    async fn test_variant_hits_exact_tier_not_fuzzy() {
        let pipeline = empty_pipeline();
        let res = pipeline.resolve("tuition", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::Static);
    }

    #[tokio::test]
    async fn test_fuzzy_match_above_threshold() {
        let pipeline = empty_pipeline();
        // "term date" vs "term dates": 18/19 ≈ 0.947.
        let res = pipeline.resolve("term date", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::Fuzzy);
        assert_eq!(res.matched_key.as_deref(), Some("term dates"));
    }

    #[tokio::test]
    async fn test_language_scoping_blocks_static_tiers() {
        let pipeline = empty_pipeline();
        let res = pipeline.resolve("fees", "fr", None, None).await;
        assert_eq!(res.source, AnswerSource::None);
    }

    #[tokio::test]
    async fn test_open_day_shortcut_with_event() {
        let feed = StaticFeed(vec![OpenDayEvent {
            event_name: "Open Morning".to_string(),
            date_iso: "2025-11-08".to_string(),
            date_human: "Saturday 8 November 2025".to_string(),
            booking_link: "https://x/y".to_string(),
        }]);
        let pipeline = pipeline_with(
            Arc::new(KnowledgeStore::empty()),
            Arc::new(DownLlm),
            Arc::new(feed),
        );

        let res = pipeline.resolve("open day", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::OpenDays);
        assert!(res.answer.contains("Open Morning"));
        assert!(res.answer.contains("Saturday 8 November 2025"));
        assert_eq!(res.url.as_deref(), Some("https://x/y"));
    }

    #[tokio::test]
    async fn test_open_day_shortcut_empty_feed_falls_back() {
        let pipeline = empty_pipeline();
        let res = pipeline.resolve("can we visit", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::OpenDays);
        assert!(res.answer.contains("check back soon"));
        assert_eq!(res.url.as_deref(), Some(OPEN_DAYS_URL));
    }

    #[tokio::test]
    async fn test_retrieval_tier_answers() {
        let pipeline = pipeline_with(
            store_with_passage(),
            Arc::new(CannedLlm("The pool opens at 7am.")),
            Arc::new(StaticFeed(Vec::new())),
        );
        let res = pipeline.resolve("when can seniors swim", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::Rag);
        assert!(res.answer.contains("pool opens at 7am"));
        // No detected topic: link falls back to the top passage's URL.
        assert_eq!(res.url.as_deref(), Some("https://example.org/swimming"));
        assert!(res.matched_key.is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_falls_to_no_match() {
        let pipeline = pipeline_with(
            store_with_passage(),
            Arc::new(DownLlm),
            Arc::new(StaticFeed(Vec::new())),
        );
        let res = pipeline.resolve("when can seniors swim", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::None);
        assert!(res.answer.contains("admissions team"));
        assert!(res.url.is_none());
        assert!(res.matched_key.is_none());
    }

    #[tokio::test]
    async fn test_empty_store_skips_retrieval() {
        let pipeline = pipeline_with(
            Arc::new(KnowledgeStore::empty()),
            Arc::new(CannedLlm("should never run")),
            Arc::new(StaticFeed(Vec::new())),
        );
        let res = pipeline.resolve("something unknown", "en", None, None).await;
        assert_eq!(res.source, AnswerSource::None);
    }

    // ── Session behaviour ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_unseen_session_id_creates_tracker() {
        let pipeline = empty_pipeline();
        assert!(pipeline.deps.registry.get("s-new").is_none());

        pipeline.resolve("fees", "en", Some("s-new"), None).await;

        let tracker = pipeline.deps.registry.get("s-new").unwrap();
        assert_eq!(tracker.lock().interaction_count(), 1);
    }

    #[tokio::test]
    async fn test_sessionless_request_leaves_registry_empty() {
        let pipeline = empty_pipeline();
        pipeline.resolve("fees", "en", None, None).await;
        assert!(pipeline.deps.registry.is_empty());
    }

    #[tokio::test]
    async fn test_voice_session_gets_enhanced_answer() {
        let pipeline = empty_pipeline();
        let res = pipeline.resolve("fees", "en", Some("s-voice"), None).await;
        assert_eq!(res.source, AnswerSource::Static);
        // Enhanced: greeting + raw answer + follow-up question.
        assert_ne!(res.answer, "A");
        assert!(res.answer.contains("A"));
        assert!(res.answer.starts_with("Hello!"));
    }

    #[tokio::test]
    async fn test_open_days_tier_records_but_never_enhances() {
        let feed = StaticFeed(vec![OpenDayEvent {
            event_name: "Open Morning".to_string(),
            date_iso: "2025-11-08".to_string(),
            date_human: "Saturday 8 November 2025".to_string(),
            booking_link: "https://x/y".to_string(),
        }]);
        let pipeline = pipeline_with(
            Arc::new(KnowledgeStore::empty()),
            Arc::new(DownLlm),
            Arc::new(feed),
        );

        let res = pipeline.resolve("open day", "en", Some("s-1"), None).await;
        assert!(res.answer.starts_with("Our next Open Morning"));

        let tracker = pipeline.deps.registry.get("s-1").unwrap();
        assert_eq!(tracker.lock().interaction_count(), 1);
        assert_eq!(tracker.lock().last_topic(), Some("open_days"));
    }

    #[tokio::test]
    async fn test_tracker_stores_pre_enhancement_excerpt() {
        let pipeline = empty_pipeline();
        pipeline.resolve("fees", "en", Some("s-x"), None).await;

        let tracker = pipeline.deps.registry.get("s-x").unwrap();
        let t = tracker.lock();
        assert_eq!(t.interactions()[0].answer_excerpt, "A");
    }

    #[tokio::test]
    async fn test_consecutive_worried_questions_accumulate_concerns() {
        let pipeline = empty_pipeline();
        pipeline
            .resolve("I'm worried about fees", "en", Some("s-c"), None)
            .await;
        pipeline
            .resolve("also worried about boarding", "en", Some("s-c"), None)
            .await;

        let tracker = pipeline.deps.registry.get("s-c").unwrap();
        let t = tracker.lock();
        assert_eq!(t.concerns().len(), 2);
        assert_eq!(t.emotional_state(), crate::conversation::EmotionalState::Concerned);
    }

    // ── Prompt assembly ─────────────────────────────────────────────────

    #[test]
    fn test_build_prompt_shape() {
        let prompt = build_prompt(
            "Previous context: Q: hello",
            &["passage one", "passage two"],
            "what about fees?",
        );
        assert!(prompt.starts_with("Previous context: Q: hello\n\n"));
        assert!(prompt.contains("Use ONLY the passages below to answer."));
        assert!(prompt.contains("passage one\n---\npassage two"));
        assert!(prompt.ends_with("Question: what about fees?\nAnswer:"));
    }

    #[test]
    fn test_previous_context_clips_questions() {
        let mut t = ConversationTracker::new("s".to_string(), None);
        let long_question = "x".repeat(120);
        for _ in 0..5 {
            t.record_interaction(&long_question, "a", None);
        }
        let context = build_previous_context(t.recent_interactions(3));
        // Three clipped questions plus separators.
        assert_eq!(context.matches("Q: ").count(), 3);
        assert!(context.len() < 3 * (PROMPT_QUESTION_CLIP + 10) + 30);
    }

    #[test]
    fn test_previous_context_empty_history() {
        assert_eq!(build_previous_context(&[]), "");
    }
}
