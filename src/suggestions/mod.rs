//! Contextual follow-up suggestions for the chat widget.
//!
//! After a question resolves, the widget shows a row of tappable next
//! questions. Suggestions are a fixed table keyed by matched topic, with a
//! question-topic detection fallback and a default set; the route layer
//! calls this after resolution, the pipeline itself never does.

use serde::Serialize;

use crate::matching::keywords;

/// One tappable suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// The question submitted when tapped.
    pub query: String,
    /// The button label.
    pub label: String,
}

/// Topic-keyed suggestion rows: (topic, [(query, label)]).
const TOPIC_SUGGESTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "fees",
        &[
            ("scholarships", "Scholarships"),
            ("term dates", "Term dates"),
            ("how to apply", "How to apply"),
        ],
    ),
    (
        "admissions",
        &[
            ("open day", "Book a visit"),
            ("fees", "School fees"),
            ("scholarships", "Scholarships"),
        ],
    ),
    (
        "open_days",
        &[
            ("how to apply", "How to apply"),
            ("boarding", "Boarding"),
            ("fees", "School fees"),
        ],
    ),
    (
        "open_events",
        &[
            ("how to apply", "How to apply"),
            ("boarding", "Boarding"),
            ("fees", "School fees"),
        ],
    ),
    (
        "boarding",
        &[
            ("pastoral", "Pastoral care"),
            ("open day", "Book a visit"),
            ("uniform", "Uniform"),
        ],
    ),
    (
        "scholarships",
        &[
            ("fees", "School fees"),
            ("how to apply", "How to apply"),
            ("sixth form", "Sixth Form"),
        ],
    ),
    (
        "sixth_form",
        &[
            ("subjects", "Subjects"),
            ("results", "Results"),
            ("how to apply", "How to apply"),
        ],
    ),
    (
        "sport",
        &[
            ("co-curricular", "Co-curricular"),
            ("music", "Music"),
            ("open day", "Book a visit"),
        ],
    ),
];

/// Shown when no topic-specific row applies.
const DEFAULT_SUGGESTIONS: &[(&str, &str)] = &[
    ("open day", "Book a visit"),
    ("fees", "School fees"),
    ("how to apply", "How to apply"),
];

/// Suggestions for a matched topic key or, failing that, the raw question.
///
/// Only English rows ship; other languages fall back to the English set
/// (the widget translates labels client-side).
pub fn get_suggestions(topic_or_question: &str, language: &str) -> Vec<Suggestion> {
    if language != "en" {
        log::debug!("no {language} suggestion rows, serving English defaults");
    }

    let needle = topic_or_question.trim().to_lowercase();

    let row = TOPIC_SUGGESTIONS
        .iter()
        .find(|(topic, _)| *topic == needle)
        .or_else(|| {
            keywords::detect_question_topic(&needle)
                .and_then(|topic| TOPIC_SUGGESTIONS.iter().find(|(t, _)| *t == topic))
        })
        .map(|(_, row)| *row)
        .unwrap_or(DEFAULT_SUGGESTIONS);

    row.iter()
        .map(|(query, label)| Suggestion {
            query: query.to_string(),
            label: label.to_string(),
        })
        .collect()
}
