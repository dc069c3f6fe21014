//! Post-processing of generated answers.
//!
//! Raw model output arrives as loosely formatted markdown. The cleanup
//! helpers strip list bullets and emphasis and normalise blank lines; the
//! topic templates then reshape the text for the handful of topics that
//! deserve a fixed structure (fees, open events, the Head). Templates are a
//! (predicate, transform) table evaluated in priority order — first match
//! renders, and the final row is a catch-all cleanup.

use once_cell::sync::Lazy;
use regex::Regex;

static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[\s]*([•\-\*\d]+\s*)+").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static TRIPLE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static BOLD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*:").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RUN_ON_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)[ \t]*\n?([A-Z][^:\n]*:)").unwrap());
static CURRENCY_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"£[\d,]+").unwrap());
static EVENT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+day),?\s*(\d{1,2})[a-z]*\s+(\w+)\s+(\d{4})").unwrap());

/// Strip leading list markers from every line.
pub fn remove_bullets(text: &str) -> String {
    BULLET_PREFIX.replace_all(text, "").to_string()
}

/// Collapse runs of blank lines and trim the ends.
pub fn normalize_blank_lines(text: &str) -> String {
    BLANK_RUNS.replace_all(text.trim(), "\n\n").to_string()
}

/// Remove `**bold**` emphasis, keeping heading colons.
fn strip_bold(text: &str) -> String {
    let text = BOLD_HEADING.replace_all(text, "$1:");
    BOLD.replace_all(&text, "$1").to_string()
}

/// Put a blank line before run-on "Heading:" fragments.
fn break_before_headings(text: &str) -> String {
    RUN_ON_HEADING.replace_all(text, "$1\n\n$2").to_string()
}

/// Default cleanup applied when no topic template claims the text.
fn default_cleanup(text: &str) -> String {
    let text = strip_bold(text);
    let text = break_before_headings(&text);
    TRIPLE_NEWLINES.replace_all(&text, "\n\n").trim().to_string()
}

// ---------------------------------------------------------------------------
// Topic templates
// ---------------------------------------------------------------------------

/// One row of the template table.
struct TopicTemplate {
    applies: fn(topic: Option<&str>, text: &str) -> bool,
    render: fn(&str) -> String,
}

/// Priority-ordered template table; the first matching row renders.
static TOPIC_TEMPLATES: &[TopicTemplate] = &[
    TopicTemplate {
        applies: |topic, _| topic == Some("fees"),
        render: render_fees,
    },
    TopicTemplate {
        applies: |topic, text| {
            topic == Some("open_events") || text.to_lowercase().contains("open morning")
        },
        render: render_open_events,
    },
    TopicTemplate {
        applies: |_, text| {
            let lower = text.to_lowercase();
            lower.contains("head") && (lower.contains("nicola") || lower.contains("huggett"))
        },
        render: |_| HEAD_ANSWER.to_string(),
    },
];

/// Run the cleaned text through the template table.
pub fn apply_topic_template(topic: Option<&str>, text: &str) -> String {
    for template in TOPIC_TEMPLATES {
        if (template.applies)(topic, text) {
            return (template.render)(text);
        }
    }
    default_cleanup(text)
}

const FEES_DISCLAIMER: &str = "IMPORTANT INFORMATION:\n\n\
    • All fees exclude VAT (20% will be added to final amount)\n\
    • Bursaries and scholarships available for eligible families\n\
    • Flexible payment plans can be arranged";

fn render_fees(text: &str) -> String {
    let clean = default_cleanup(text);

    if CURRENCY_AMOUNT.is_match(&clean) {
        format!(
            "SCHOOL FEES 2025-26\n\n{clean}\n\n{FEES_DISCLAIMER}\n\n\
             For complete fee schedules and additional cost breakdowns, please visit our fees page."
        )
    } else {
        format!(
            "FEES & FINANCIAL INFORMATION\n\n{clean}\n\n{FEES_DISCLAIMER}\n\n\
             For detailed fee schedules, payment options, and financial support information, \
             please visit our fees page."
        )
    }
}

fn render_open_events(text: &str) -> String {
    let clean = strip_bold(text);

    let dates: Vec<String> = EVENT_DATE
        .captures_iter(&clean)
        .map(|caps| {
            format!(
                "• {} {} {} {} from 9:30 AM - 12:30 PM",
                &caps[1], &caps[2], &caps[3], &caps[4]
            )
        })
        .collect();

    if dates.is_empty() {
        return clean;
    }

    format!(
        "OPEN MORNING EVENTS\n\n\
         Join us for an Open Morning to explore our facilities, meet staff and students, \
         and experience school life firsthand.\n\n\
         UPCOMING DATES:\n\n{}\n\n\
         HOW TO BOOK:\n\n\
         Email: visits@cheltenhamcollege.org\n\
         Phone: 01242 265600\n\n\
         These events fill up quickly, so we recommend booking early to secure your place.",
        dates.join("\n")
    )
}

const HEAD_ANSWER: &str = "SCHOOL LEADERSHIP\n\n\
    Head: Mrs Nicola Huggett\n\n\
    Mrs Huggett leads Cheltenham College with extensive experience in independent education. \
    She is committed to academic excellence, pastoral care, and developing well-rounded \
    students who are prepared for future success.\n\n\
    For more information about our leadership team and staff, please visit our website.";
