//! Keyword tables for topic, intent and emotion detection.
//!
//! Every detector here is a substring scan over a fixed table, so tuning the
//! vocabulary never touches control flow. Callers pass an already
//! lower-cased question; detection is ordered, first matching group wins.

/// Phrases that route a question straight to the open-days tier.
pub const OPEN_DAY_TRIGGERS: &[&str] = &["open day", "open morning", "open evening", "visit", "tour"];

/// Phrases that count as a high-intent signal on the conversation tracker.
pub const HIGH_INTENT_KEYWORDS: &[&str] =
    &["apply", "visit", "fee", "scholarship", "when can", "how do i", "register"];

/// Phrases that mark a question as a concern and flip the emotional state.
pub const CONCERN_KEYWORDS: &[&str] = &[
    "worried", "concern", "anxiety", "difficult", "struggle", "help", "support", "nervous",
];

/// Coarse question topics, checked in order. Used by the retrieval tier to
/// pick a formatting template and an outbound link.
const QUESTION_TOPICS: &[(&str, &[&str])] = &[
    ("fees", &["fee", "cost", "price", "tuition", "charges"]),
    ("admissions", &["admission", "apply", "join", "register"]),
    ("subjects", &["subject", "curriculum", "academic"]),
    ("boarding", &["boarding", "boarder", "house"]),
    ("scholarships", &["scholarship", "bursary", "award"]),
    ("open_events", &["open", "visit", "tour"]),
    ("sixth_form", &["sixth form", "a level", "upper college"]),
    ("sport", &["sport", "athletics", "rugby", "netball"]),
];

/// Follow-up categories for the response enhancer, checked in order.
const FOLLOW_UP_CATEGORIES: &[(&str, &[&str])] = &[
    ("fees", &["fee", "cost", "price", "burs", "scholar"]),
    ("sports", &["sport", "athletic", "team", "football", "netball"]),
    ("academic", &["academic", "subject", "curriculum", "exam", "result"]),
    ("admissions", &["admission", "apply", "join", "entry", "register"]),
    ("pastoral", &["pastoral", "care", "wellbeing", "support", "help"]),
];

/// True if `haystack` contains any of `needles`.
pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// True if the question should be answered by the open-days tier.
pub fn mentions_open_day(question_lower: &str) -> bool {
    contains_any(question_lower, OPEN_DAY_TRIGGERS)
}

/// True if the question carries a high-intent signal.
pub fn is_high_intent(question_lower: &str) -> bool {
    contains_any(question_lower, HIGH_INTENT_KEYWORDS)
}

/// True if the question reads as a concern.
pub fn is_concern(question_lower: &str) -> bool {
    contains_any(question_lower, CONCERN_KEYWORDS)
}

/// Detect the coarse topic of a question, if any.
pub fn detect_question_topic(question_lower: &str) -> Option<&'static str> {
    QUESTION_TOPICS
        .iter()
        .find(|(_, words)| contains_any(question_lower, words))
        .map(|(topic, _)| *topic)
}

/// Map a tracked topic to a follow-up category, defaulting to "general".
pub fn categorize_topic(topic: &str) -> &'static str {
    let topic_lower = topic.to_lowercase();
    FOLLOW_UP_CATEGORIES
        .iter()
        .find(|(_, words)| contains_any(&topic_lower, words))
        .map(|(category, _)| *category)
        .unwrap_or("general")
}
