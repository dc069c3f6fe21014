//! External collaborator contracts.
//!
//! Every network dependency of the pipeline sits behind one of these traits:
//! embeddings, generative completion, translation, the open-events feed and
//! the family directory. Implementations must keep their calls
//! timeout-bounded and report failure as a typed [`ProviderError`] — the
//! pipeline treats every failure as "collaborator unavailable" and falls
//! through to the next tier, it never propagates one to the caller.

pub mod openai;
pub mod translate;

use async_trait::async_trait;
use thiserror::Error;

use crate::events::OpenDayEvent;
use crate::family::{FamilyContext, InteractionLog};

/// Failure of an external collaborator call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or timed out.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider answered with something we could not interpret.
    #[error("provider response was malformed: {0}")]
    Malformed(String),

    /// The provider is not configured for this deployment.
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Text-to-vector embedding provider.
///
/// Dimensionality is fixed per model; the retriever guards against a model
/// swap that disagrees with the stored knowledge base.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Chat-style generative completion provider.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Complete `prompt` under `system_persona` at the given temperature.
    async fn complete(
        &self,
        system_persona: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

/// Best-effort text translator.
///
/// Callers must survive failure: the pipeline falls back to the untranslated
/// text whenever a translation call errors.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language` (ISO 639-1 code).
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;
}

/// Externally refreshed feed of upcoming open-day events.
#[async_trait]
pub trait OpenEventsFeed: Send + Sync {
    /// All currently listed events, unsorted.
    async fn list_events(&self) -> Result<Vec<OpenDayEvent>, ProviderError>;
}

/// Lookup of family enquiry profiles, keyed by family id.
#[async_trait]
pub trait FamilyDirectory: Send + Sync {
    /// Fetch the profile for `family_id`; `Ok(None)` when unknown.
    async fn get_family(&self, family_id: &str) -> Result<Option<FamilyContext>, ProviderError>;

    /// Record a resolved interaction for the admissions dashboard.
    ///
    /// Default is a no-op so in-memory deployments need not care.
    async fn log_interaction(
        &self,
        _family_id: &str,
        _question: &str,
        _answer: &str,
        _log: &InteractionLog,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}
