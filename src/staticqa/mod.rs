//! Curated static question/answer table.
//!
//! Hand-authored entries generated offline from the school's site map, one
//! per canonical topic, each with phrasing variants and an optional outbound
//! link. The default table is embedded at compile time and parsed once at
//! startup; matching is case-insensitive and scoped to the entry's language.

use serde::{Deserialize, Serialize};

use crate::matching::fuzzy::sequence_ratio;

/// Default English table embedded at compile time.
pub const STATIC_QA_JSON: &str = include_str!("static_qa_en.json");

/// One curated question/answer entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAnswerEntry {
    /// Canonical topic identifier, unique per language. Propagated
    /// downstream as the matched topic.
    pub key: String,
    /// Language the entry answers in (ISO 639-1).
    pub language: String,
    /// The answer text.
    pub answer: String,
    /// Phrasing variants; the key itself is always included.
    #[serde(default)]
    pub variants: Vec<String>,
    /// Optional outbound link.
    #[serde(default)]
    pub url: Option<String>,
    /// Optional label for the link.
    #[serde(default)]
    pub label: Option<String>,
}

/// Ordered collection of static entries; earlier entries win ties.
#[derive(Debug, Clone, Default)]
pub struct StaticAnswerTable {
    entries: Vec<StaticAnswerEntry>,
}

impl StaticAnswerTable {
    /// Parse the embedded default table.
    pub fn load_default() -> Self {
        Self::from_json(STATIC_QA_JSON).expect("embedded static QA table must parse")
    }

    /// Parse a table from a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<StaticAnswerEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    /// Build a table, ensuring every entry lists its key among its variants.
    pub fn from_entries(entries: Vec<StaticAnswerEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                let has_key = entry
                    .variants
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(&entry.key));
                if !has_key {
                    entry.variants.insert(0, entry.key.clone());
                }
                entry
            })
            .collect();
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in table order.
    pub fn entries(&self) -> &[StaticAnswerEntry] {
        &self.entries
    }

    /// First same-language entry with a variant equal to the question.
    ///
    /// `question_lower` must already be lower-cased and trimmed.
    pub fn exact_match(&self, question_lower: &str, language: &str) -> Option<&StaticAnswerEntry> {
        self.entries
            .iter()
            .filter(|e| e.language == language)
            .find(|e| {
                e.variants
                    .iter()
                    .any(|v| v.to_lowercase() == question_lower)
            })
    }

    /// Highest-scoring same-language entry under the fuzzy ratio.
    ///
    /// Scores every variant of every entry; the comparison is strict, so the
    /// earliest entry reaching the maximum wins. The caller applies its own
    /// acceptance threshold.
    pub fn best_fuzzy_match(
        &self,
        question_lower: &str,
        language: &str,
    ) -> Option<(&StaticAnswerEntry, f64)> {
        let mut best: Option<(&StaticAnswerEntry, f64)> = None;

        for entry in self.entries.iter().filter(|e| e.language == language) {
            for variant in &entry.variants {
                let score = sequence_ratio(question_lower, &variant.to_lowercase());
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((entry, score));
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, language: &str, variants: &[&str]) -> StaticAnswerEntry {
        StaticAnswerEntry {
            key: key.to_string(),
            language: language.to_string(),
            answer: format!("answer for {key}"),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            url: Some(format!("https://example.org/{key}")),
            label: Some(key.to_string()),
        }
    }

    #[test]
    fn test_default_table_parses() {
        let table = StaticAnswerTable::load_default();
        assert!(!table.is_empty());
        // Every entry must carry its key as a variant.
        for e in table.entries() {
            assert!(
                e.variants.iter().any(|v| v.eq_ignore_ascii_case(&e.key)),
                "entry {} missing key variant",
                e.key
            );
        }
    }

    #[test]
    fn test_key_is_injected_into_variants() {
        let table = StaticAnswerTable::from_entries(vec![entry("fees", "en", &["tuition"])]);
        assert_eq!(table.entries()[0].variants, vec!["fees", "tuition"]);
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let table = StaticAnswerTable::from_entries(vec![entry("fees", "en", &["fees", "tuition"])]);
        let hit = table.exact_match("tuition", "en").unwrap();
        assert_eq!(hit.key, "fees");
        assert!(table.exact_match("tuition", "fr").is_none());
    }

    #[test]
    fn test_exact_match_first_entry_wins() {
        let table = StaticAnswerTable::from_entries(vec![
            entry("fees", "en", &["costs"]),
            entry("pricing", "en", &["costs"]),
        ]);
        assert_eq!(table.exact_match("costs", "en").unwrap().key, "fees");
    }

    #[test]
    fn test_fuzzy_match_prefers_earlier_entry_on_tie() {
        let table = StaticAnswerTable::from_entries(vec![
            entry("fees", "en", &["school fees"]),
            entry("fees2", "en", &["school fees"]),
        ]);
        let (hit, score) = table.best_fuzzy_match("school fees", "en").unwrap();
        assert_eq!(hit.key, "fees");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_fuzzy_match_scores_best_variant() {
        let table = StaticAnswerTable::from_entries(vec![
            entry("term dates", "en", &["term dates", "calendar"]),
            entry("sport", "en", &["sport"]),
        ]);
        let (hit, score) = table.best_fuzzy_match("term date", "en").unwrap();
        assert_eq!(hit.key, "term dates");
        assert!(score > 0.8);
    }

    #[test]
    fn test_fuzzy_match_empty_language_scope() {
        let table = StaticAnswerTable::from_entries(vec![entry("fees", "en", &["fees"])]);
        assert!(table.best_fuzzy_match("fees", "fr").is_none());
    }
}
