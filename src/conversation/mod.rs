//! Per-session conversation state.
//!
//! A [`ConversationTracker`] accumulates everything the pipeline learns about
//! a session: the interaction history, topics discussed, detected concerns,
//! and high-intent signals. All derived state is updated inside
//! [`ConversationTracker::record_interaction`] — the single write path — so
//! the enhancer and the dashboard read a consistent picture.

pub mod registry;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::keywords;

/// Stored answers are truncated to this many characters to bound memory.
pub const ANSWER_EXCERPT_LIMIT: usize = 200;

/// Concerns reported in a summary are capped at this many.
const SUMMARY_CONCERN_LIMIT: usize = 3;

/// One resolved question/answer exchange.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    /// When the interaction was recorded.
    pub timestamp: DateTime<Utc>,
    /// The question as asked.
    pub question: String,
    /// The answer, truncated to [`ANSWER_EXCERPT_LIMIT`] characters.
    pub answer_excerpt: String,
    /// Topic the answer resolved to, when known.
    pub topic: Option<String>,
}

/// Coarse emotional read of the session.
///
/// There is no transition back to `Neutral`: once a parent has voiced a
/// concern the rest of the session stays in caring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    Neutral,
    Concerned,
}

impl EmotionalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalState::Neutral => "neutral",
            EmotionalState::Concerned => "concerned",
        }
    }
}

/// Dashboard-facing snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub session_duration_seconds: i64,
    pub interaction_count: usize,
    pub topics: Vec<String>,
    pub high_intent: bool,
    pub emotional_state: EmotionalState,
    pub concerns: Vec<String>,
    pub last_topic: Option<String>,
}

/// Mutable conversation state for one session.
#[derive(Debug, Clone)]
pub struct ConversationTracker {
    session_id: String,
    family_id: Option<String>,
    started_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    interactions: Vec<Interaction>,
    topics_discussed: HashSet<String>,
    concerns: Vec<String>,
    last_topic: Option<String>,
    last_topic_repeated: bool,
    emotional_state: EmotionalState,
    high_intent_signals: u32,
}

impl ConversationTracker {
    pub fn new(session_id: String, family_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            family_id,
            started_at: now,
            last_activity: now,
            interactions: Vec::new(),
            topics_discussed: HashSet::new(),
            concerns: Vec::new(),
            last_topic: None,
            last_topic_repeated: false,
            emotional_state: EmotionalState::Neutral,
            high_intent_signals: 0,
        }
    }

    /// Record a resolved exchange and update every derived field.
    ///
    /// This is the only mutation path. Topic bookkeeping notes whether the
    /// topic had come up before (`last_topic_repeated`) *before* inserting
    /// it, which is what the enhancer's "following on" acknowledgment keys
    /// off. High-intent and concern detection run against the lower-cased
    /// question via the keyword tables.
    pub fn record_interaction(&mut self, question: &str, answer: &str, topic: Option<&str>) {
        let question_lower = question.to_lowercase();

        match topic {
            Some(topic) => {
                self.last_topic_repeated = self.topics_discussed.contains(topic);
                self.topics_discussed.insert(topic.to_string());
                self.last_topic = Some(topic.to_string());
            }
            None => self.last_topic_repeated = false,
        }

        if keywords::is_high_intent(&question_lower) {
            self.high_intent_signals += 1;
        }

        if keywords::is_concern(&question_lower) {
            self.concerns.push(question.to_string());
            self.emotional_state = EmotionalState::Concerned;
        }

        let now = Utc::now();
        self.interactions.push(Interaction {
            timestamp: now,
            question: question.to_string(),
            answer_excerpt: answer.chars().take(ANSWER_EXCERPT_LIMIT).collect(),
            topic: topic.map(str::to_string),
        });
        self.last_activity = now;
    }

    /// Whether the session has earned an offer to talk to a human.
    ///
    /// Pure function of current state: enough high-intent signals, repeated
    /// concerns, a long conversation, or any concerned state at all.
    pub fn should_offer_human_handoff(&self) -> bool {
        self.high_intent_signals >= 3
            || self.concerns.len() >= 2
            || self.interactions.len() >= 10
            || self.emotional_state == EmotionalState::Concerned
    }

    /// Snapshot for the admissions dashboard.
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            session_duration_seconds: (Utc::now() - self.started_at).num_seconds(),
            interaction_count: self.interactions.len(),
            topics: self.topics_discussed.iter().cloned().collect(),
            high_intent: self.high_intent_signals >= 2,
            emotional_state: self.emotional_state,
            concerns: self
                .concerns
                .iter()
                .take(SUMMARY_CONCERN_LIMIT)
                .cloned()
                .collect(),
            last_topic: self.last_topic.clone(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn family_id(&self) -> Option<&str> {
        self.family_id.as_deref()
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Up to the last `n` interactions, oldest first.
    pub fn recent_interactions(&self, n: usize) -> &[Interaction] {
        let start = self.interactions.len().saturating_sub(n);
        &self.interactions[start..]
    }

    pub fn last_topic(&self) -> Option<&str> {
        self.last_topic.as_deref()
    }

    /// True when the most recent recorded topic had been discussed before.
    pub fn last_topic_repeated(&self) -> bool {
        self.last_topic_repeated
    }

    pub fn emotional_state(&self) -> EmotionalState {
        self.emotional_state
    }

    pub fn concerns(&self) -> &[String] {
        &self.concerns
    }

    pub fn high_intent_signals(&self) -> u32 {
        self.high_intent_signals
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }
}
