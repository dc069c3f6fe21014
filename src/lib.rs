//! # penai
//!
//! Backend for a school's conversational admissions assistant. Questions from
//! prospective families are resolved through a tiered pipeline — open-days
//! intent shortcut, exact and fuzzy static lookup, then semantic retrieval
//! with generative summarization — while a per-session conversation tracker
//! drives intent/emotion detection, human-handoff decisions, and the
//! voice-oriented response enhancement layer.

pub mod config;
pub mod conversation;
pub mod enhancer;
pub mod events;
pub mod family;
pub mod knowledge;
pub mod matching;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod staticqa;
pub mod suggestions;

// Primary API re-exports.
pub use conversation::registry::SessionRegistry;
pub use conversation::{ConversationTracker, EmotionalState};
pub use enhancer::ResponseEnhancer;
pub use knowledge::{KnowledgePassage, KnowledgeStore};
pub use pipeline::{AnswerPipeline, AnswerSource, PipelineDeps, Resolution};
pub use retrieval::VectorRetriever;
pub use staticqa::{StaticAnswerEntry, StaticAnswerTable};

/// Crate version, surfaced by the health endpoint.
pub const VERSION: &str = "0.3.0";
