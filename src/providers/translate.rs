//! Best-effort translation on top of the generative provider.
//!
//! Translation rides the same chat-completion endpoint as summarization,
//! pinned to temperature 0 with a translation-only persona. Failures bubble
//! up as [`ProviderError`] for the caller to swallow.

use std::sync::Arc;

use async_trait::async_trait;

use super::{GenerativeProvider, ProviderError, Translator};

const TRANSLATOR_PERSONA: &str =
    "You are a precise translator. Reply with the translation only, no commentary.";

/// ISO 639-1 codes the widget's language picker offers.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ru", "Russian"),
    ("ar", "Arabic"),
];

/// Spell out a language code for the prompt; unknown codes pass through.
fn language_name(code: &str) -> &str {
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// Translator backed by any [`GenerativeProvider`].
pub struct LlmTranslator {
    llm: Arc<dyn GenerativeProvider>,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn GenerativeProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        let prompt = format!(
            "Translate the following text into {}. Keep URLs, email addresses, phone numbers and proper names unchanged.\n\n{}",
            language_name(target_language),
            text
        );
        let translated = self.llm.complete(TRANSLATOR_PERSONA, &prompt, 0.0).await?;
        Ok(translated.trim().to_string())
    }
}
