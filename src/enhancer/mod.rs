//! Voice-oriented response enhancement.
//!
//! Turns a raw factual answer into a conversational utterance: an
//! acknowledgment that fits where the conversation is, the answer itself
//! personalised with the child's name, reassurance when the parent has
//! voiced concerns, a contextual follow-up question, and — on a configurable
//! cadence — an offer to hand over to a human.
//!
//! Enhancement is a pure transformation of tracker state. The rotation index
//! is the tracker's interaction count, so a duplicate call at the same count
//! produces the same text while successive turns vary their phrasing.

use crate::conversation::{ConversationTracker, EmotionalState};
use crate::family::FamilyContext;
use crate::matching::keywords;

/// Default handoff-offer cadence (every Nth interaction).
pub const DEFAULT_HANDOFF_CADENCE: usize = 5;

/// Placeholder substituted with the child's name in follow-up templates.
const CHILD_NAME_PLACEHOLDER: &str = "{child_name}";

/// Fallback when the child's name is unknown.
const CHILD_NAME_DEFAULT: &str = "your daughter";

const FIRST_GREETING: &str = "Hello! What a lovely question to start with.";
const FOLLOWING_ON: &str = "Following on from what we discussed...";
const CONCERNED_ACKNOWLEDGMENT: &str = "I can hear this is important to you.";

const ACKNOWLEDGMENTS: &[&str] = &[
    "That's a great question.",
    "I'm glad you asked about that.",
    "Let me tell you about that.",
    "Excellent question.",
    "Many families ask about this.",
];

const REASSURANCE_PHRASES: &[&str] = &[
    "That's a very common concern, and I'm happy to address it...",
    "Many parents ask about this, and it's important to get it right...",
    "I completely understand why you'd want to know about this...",
    "That's an excellent question, and I'm glad you asked...",
];

const HANDOFF_OFFER: &str = " By the way, would you like me to arrange for someone from our \
                             admissions team to call you directly?";

const NO_TOPIC_FOLLOW_UP: &str =
    "Is there anything specific you'd like to know about Cheltenham College?";

/// Follow-up question pools per topic category.
const FOLLOW_UPS: &[(&str, &[&str])] = &[
    (
        "fees",
        &[
            "Are you also interested in our scholarship opportunities?",
            "Would you like to know about our payment plans?",
            "Shall I explain our bursary programme?",
        ],
    ),
    (
        "sports",
        &[
            "What sports does {child_name} enjoy currently?",
            "Is {child_name} interested in competitive teams or recreational activities?",
            "Would you like to know about our sports facilities?",
        ],
    ),
    (
        "academic",
        &[
            "What subjects does {child_name} particularly enjoy?",
            "Are you interested in our academic enrichment programmes?",
            "Would you like to see our recent exam results?",
        ],
    ),
    (
        "admissions",
        &[
            "Which year group are you considering for entry?",
            "Would you like to book a personal tour?",
            "Shall I explain our application timeline?",
        ],
    ),
    (
        "pastoral",
        &[
            "Is there anything specific about {child_name}'s needs I should know?",
            "Would you like to speak with our pastoral team?",
            "Are you interested in our wellbeing programmes?",
        ],
    ),
];

const GENERAL_FOLLOW_UPS: &[&str] = &["What else would you like to know?"];

/// Stateless enhancer; all variation comes from the tracker.
#[derive(Debug, Clone)]
pub struct ResponseEnhancer {
    handoff_cadence: usize,
}

impl ResponseEnhancer {
    pub fn new() -> Self {
        Self::with_cadence(DEFAULT_HANDOFF_CADENCE)
    }

    /// Override the handoff cadence; clamped to at least 1.
    pub fn with_cadence(cadence: usize) -> Self {
        Self {
            handoff_cadence: cadence.max(1),
        }
    }

    /// Rewrite `raw_answer` into a conversational reply.
    ///
    /// Expects to run after the interaction has been recorded, so an
    /// interaction count of 1 means "first question of the session".
    pub fn enhance(
        &self,
        raw_answer: &str,
        tracker: &ConversationTracker,
        family: Option<&FamilyContext>,
    ) -> String {
        let count = tracker.interaction_count();
        let mut enhanced = format!("{} {}", self.acknowledgment(tracker), raw_answer);

        if let Some(name) = family.and_then(|f| f.child_name.as_deref()) {
            enhanced = enhanced.replace("your child", name).replace("your daughter", name);
        }

        if tracker.emotional_state() == EmotionalState::Concerned {
            let phrase = REASSURANCE_PHRASES[tracker.concerns().len() % REASSURANCE_PHRASES.len()];
            enhanced = format!("{phrase} {enhanced}");
        }

        let follow_up = self.follow_up(tracker, family);
        enhanced.push(' ');
        enhanced.push_str(&follow_up);

        if tracker.should_offer_human_handoff() && count % self.handoff_cadence == 0 {
            enhanced.push_str(HANDOFF_OFFER);
        }

        enhanced
    }

    /// Opening phrase, in priority order: first question, repeated topic,
    /// concerned parent, then the rotating pool.
    fn acknowledgment(&self, tracker: &ConversationTracker) -> &'static str {
        if tracker.interaction_count() <= 1 {
            FIRST_GREETING
        } else if tracker.last_topic_repeated() {
            FOLLOWING_ON
        } else if tracker.emotional_state() == EmotionalState::Concerned {
            CONCERNED_ACKNOWLEDGMENT
        } else {
            ACKNOWLEDGMENTS[tracker.interaction_count() % ACKNOWLEDGMENTS.len()]
        }
    }

    /// Contextual follow-up question for the current topic.
    fn follow_up(&self, tracker: &ConversationTracker, family: Option<&FamilyContext>) -> String {
        let Some(topic) = tracker.last_topic() else {
            return NO_TOPIC_FOLLOW_UP.to_string();
        };

        let category = keywords::categorize_topic(topic);
        let pool = FOLLOW_UPS
            .iter()
            .find(|(key, _)| *key == category)
            .map(|(_, qs)| *qs)
            .unwrap_or(GENERAL_FOLLOW_UPS);

        let question = pool[tracker.interaction_count() % pool.len()];
        let child_name = family
            .and_then(|f| f.child_name.as_deref())
            .unwrap_or(CHILD_NAME_DEFAULT);
        question.replace(CHILD_NAME_PLACEHOLDER, child_name)
    }
}

impl Default for ResponseEnhancer {
    fn default() -> Self {
        Self::new()
    }
}
