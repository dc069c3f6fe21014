//! Family enquiry profiles.
//!
//! A [`FamilyContext`] is the read-only profile an admissions CRM holds for a
//! prospective family; the core only consumes it (personalization in the
//! response enhancer). The concrete directory is postgres-backed behind the
//! `postgres` feature; the default build uses [`NoFamilyDirectory`], which
//! knows nobody.

#[cfg(feature = "postgres")]
pub mod pg;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::providers::{FamilyDirectory, ProviderError};

/// Profile fields surfaced to the core. Never mutated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FamilyContext {
    pub family_id: String,
    pub child_name: Option<String>,
    pub year_group: Option<String>,
    pub boarding_status: Option<String>,
    pub interests: Option<String>,
    pub country: Option<String>,
    pub language_pref: String,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
}

/// Metadata recorded alongside a logged interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionLog {
    /// Which tier answered ("static", "rag", ...).
    pub source: String,
    /// Matched topic, when known.
    pub topic: Option<String>,
    /// Tracker emotional state at answer time.
    pub sentiment: String,
    /// Session id, when the request carried one.
    pub session_id: Option<String>,
    /// Whether the tracker has seen any high-intent signal.
    pub high_intent: bool,
}

/// Trim a value for display, appending an ellipsis past `limit` characters.
pub fn safe_trim(value: &str, limit: usize) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() <= limit {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(limit).collect();
        cut.push('…');
        cut
    }
}

/// Directory for deployments without a CRM database.
pub struct NoFamilyDirectory;

#[async_trait]
impl FamilyDirectory for NoFamilyDirectory {
    async fn get_family(&self, _family_id: &str) -> Result<Option<FamilyContext>, ProviderError> {
        Err(ProviderError::NotConfigured("family directory is disabled".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_trim_short_value() {
        assert_eq!(safe_trim("  Year 9  ", 120), "Year 9");
    }

    #[test]
    fn test_safe_trim_long_value() {
        let long = "a".repeat(130);
        let out = safe_trim(&long, 120);
        assert_eq!(out.chars().count(), 121);
        assert!(out.ends_with('…'));
    }

    #[tokio::test]
    async fn test_noop_directory_is_not_configured() {
        let err = NoFamilyDirectory.get_family("fam-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        // Logging stays a silent no-op.
        let log = InteractionLog {
            source: "static".into(),
            topic: Some("fees".into()),
            sentiment: "neutral".into(),
            session_id: None,
            high_intent: false,
        };
        assert!(NoFamilyDirectory.log_interaction("fam-1", "q", "a", &log).await.is_ok());
    }
}
