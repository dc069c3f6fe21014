//! Open-day events: cache-file feed and page extraction.
//!
//! The admissions site lists open events as free text; a scheduled refresh
//! task fetches the page, extracts upcoming events, and writes them to a
//! small JSON cache. Request handling only ever reads the cache, so a broken
//! refresh never affects answering — the feed just goes stale or empty.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::providers::{OpenEventsFeed, ProviderError};

/// Public page the events are extracted from.
pub const OPEN_DAYS_URL: &str =
    "https://www.cheltenhamcollege.org/admissions/visit-us/open-events/";

/// One upcoming open event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDayEvent {
    /// Normalised event name ("Open Morning").
    pub event_name: String,
    /// ISO date, sortable as a string.
    pub date_iso: String,
    /// Spoken form ("Saturday 8 November 2025").
    pub date_human: String,
    /// Where the family can register.
    pub booking_link: String,
}

/// Cache file payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenDaysPayload {
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub last_checked: Option<String>,
    #[serde(default)]
    pub events: Vec<OpenDayEvent>,
}

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static EVENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)((?:Sixth Form )?Open (?:Morning|Evening|Day|Event))\s*[–-]\s*([A-Za-z]+)\s+(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\s+(\d{4})",
    )
    .unwrap()
});

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spoken date without a zero-padded day.
fn humanize(date: NaiveDate) -> String {
    format!(
        "{} {} {} {}",
        date.format("%A"),
        date.day(),
        date.format("%B"),
        date.year()
    )
}

/// Extract upcoming events from the admissions page HTML.
///
/// Tags are stripped and whitespace collapsed before matching
/// "Event Name – Weekday 8 November 2025" runs. Past dates (before `today`)
/// are dropped, duplicates collapse on (name, date), and the result is
/// sorted by date then name.
pub fn extract_events_from_html(html: &str, today: NaiveDate) -> Vec<OpenDayEvent> {
    let text = TAG_PATTERN.replace_all(html, " ");
    let text = WHITESPACE_PATTERN.replace_all(&text, " ");

    let mut events: Vec<OpenDayEvent> = Vec::new();
    for caps in EVENT_PATTERN.captures_iter(&text) {
        let (name, day, month, year) = (&caps[1], &caps[3], &caps[4], &caps[5]);

        let Some(month) = month_number(month) else {
            continue;
        };
        let (Ok(day), Ok(year)) = (day.parse::<u32>(), year.parse::<i32>()) else {
            continue;
        };
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        if date < today {
            continue;
        }

        let event = OpenDayEvent {
            event_name: title_case(name),
            date_iso: date.format("%Y-%m-%d").to_string(),
            date_human: humanize(date),
            booking_link: OPEN_DAYS_URL.to_string(),
        };
        if !events
            .iter()
            .any(|e| e.event_name == event.event_name && e.date_iso == event.date_iso)
        {
            events.push(event);
        }
    }

    events.sort_by(|a, b| (&a.date_iso, &a.event_name).cmp(&(&b.date_iso, &b.event_name)));
    events
}

/// The next chronological event, by minimum ISO date.
pub fn next_upcoming(events: &[OpenDayEvent]) -> Option<&OpenDayEvent> {
    events.iter().min_by_key(|e| &e.date_iso)
}

/// JSON cache the refresh task writes and request handling reads.
pub struct OpenDaysCache {
    path: PathBuf,
}

impl OpenDaysCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the cache; missing or corrupt files yield an empty payload.
    pub fn read(&self) -> OpenDaysPayload {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("open-days cache at {} is corrupt: {e}", self.path.display());
                OpenDaysPayload {
                    source_url: OPEN_DAYS_URL.to_string(),
                    ..Default::default()
                }
            }),
            Err(e) => {
                log::debug!("open-days cache at {} unreadable: {e}", self.path.display());
                OpenDaysPayload {
                    source_url: OPEN_DAYS_URL.to_string(),
                    ..Default::default()
                }
            }
        }
    }

    /// Persist a refreshed payload.
    pub fn write(&self, payload: &OpenDaysPayload) -> Result<(), anyhow::Error> {
        let json = serde_json::to_string_pretty(payload)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl OpenEventsFeed for OpenDaysCache {
    async fn list_events(&self) -> Result<Vec<OpenDayEvent>, ProviderError> {
        Ok(self.read().events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[test]
    fn test_extract_events_from_html() {
        let html = r#"
            <div><h3>Open Morning – Saturday 8 November 2025</h3>
            <p>Book now</p>
            <h3>Sixth Form Open Evening – Thursday 25 September 2025</h3></div>
        "#;
        let events = extract_events_from_html(html, today());
        assert_eq!(events.len(), 2);
        // Sorted by date: September before November.
        assert_eq!(events[0].event_name, "Sixth Form Open Evening");
        assert_eq!(events[0].date_iso, "2025-09-25");
        assert_eq!(events[1].date_human, "Saturday 8 November 2025");
    }

    #[test]
    fn test_extract_skips_past_events() {
        let html = "Open Morning – Saturday 8 March 2025";
        assert!(extract_events_from_html(html, today()).is_empty());
    }

    #[test]
    fn test_extract_dedupes_repeated_listings() {
        let html = "Open Day – Friday 10 October 2025 ... Open Day – Friday 10 October 2025";
        assert_eq!(extract_events_from_html(html, today()).len(), 1);
    }

    #[test]
    fn test_extract_handles_ordinal_days() {
        let html = "Open Morning – Saturday 8th November 2025";
        let events = extract_events_from_html(html, today());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date_iso, "2025-11-08");
    }

    #[test]
    fn test_next_upcoming_by_iso_date() {
        let events = vec![
            OpenDayEvent {
                event_name: "Open Day".into(),
                date_iso: "2025-11-08".into(),
                date_human: "Saturday 8 November 2025".into(),
                booking_link: OPEN_DAYS_URL.into(),
            },
            OpenDayEvent {
                event_name: "Open Evening".into(),
                date_iso: "2025-09-25".into(),
                date_human: "Thursday 25 September 2025".into(),
                booking_link: OPEN_DAYS_URL.into(),
            },
        ];
        assert_eq!(next_upcoming(&events).unwrap().date_iso, "2025-09-25");
        assert!(next_upcoming(&[]).is_none());
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OpenDaysCache::new(dir.path().join("open_days.json"));

        // Missing file reads as empty.
        assert!(cache.read().events.is_empty());

        let payload = OpenDaysPayload {
            source_url: OPEN_DAYS_URL.to_string(),
            last_checked: Some("2025-09-01T00:00:00Z".to_string()),
            events: vec![OpenDayEvent {
                event_name: "Open Morning".into(),
                date_iso: "2025-11-08".into(),
                date_human: "Saturday 8 November 2025".into(),
                booking_link: OPEN_DAYS_URL.into(),
            }],
        };
        cache.write(&payload).unwrap();
        assert_eq!(cache.read().events, payload.events);
    }

    #[test]
    fn test_corrupt_cache_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open_days.json");
        fs::write(&path, "{not json").unwrap();
        let cache = OpenDaysCache::new(path);
        assert!(cache.read().events.is_empty());
    }
}
