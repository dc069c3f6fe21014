//! Topic → outbound link resolution for generated answers.

/// Site root, the final fallback for any answer link.
pub const SITE_ROOT: &str = "https://www.cheltenhamcollege.org/";

/// Fixed (topic, url, label) rows for detected question topics.
const TOPIC_LINKS: &[(&str, &str, &str)] = &[
    (
        "fees",
        "https://www.cheltenhamcollege.org/admissions/fees/",
        "View fees page",
    ),
    (
        "admissions",
        "https://www.cheltenhamcollege.org/admissions/",
        "Visit admissions page",
    ),
    (
        "subjects",
        "https://www.cheltenhamcollege.org/college/curriculum/",
        "Explore curriculum",
    ),
    (
        "boarding",
        "https://www.cheltenhamcollege.org/college/boarding/",
        "Discover boarding life",
    ),
    (
        "scholarships",
        "https://www.cheltenhamcollege.org/admissions/scholarships-awards/",
        "View scholarships",
    ),
    (
        "open_events",
        "https://www.cheltenhamcollege.org/admissions/visit-us/open-events/",
        "Book open event",
    ),
    (
        "sixth_form",
        "https://www.cheltenhamcollege.org/college/upper-college-16-18/",
        "Learn about Sixth Form",
    ),
    (
        "sport",
        "https://www.cheltenhamcollege.org/college/co-curricular/sport/",
        "Explore sports",
    ),
];

/// Resolve the best link for an answer.
///
/// A detected topic wins; otherwise the top retrieved passage's own URL,
/// then the site root.
pub fn link_for_topic(topic: Option<&str>, passage_url: Option<&str>) -> (String, String) {
    if let Some(topic) = topic {
        if let Some((_, url, label)) = TOPIC_LINKS.iter().find(|(t, _, _)| *t == topic) {
            return (url.to_string(), label.to_string());
        }
    }

    let url = passage_url.filter(|u| !u.is_empty()).unwrap_or(SITE_ROOT);
    (url.to_string(), "Visit website".to_string())
}
