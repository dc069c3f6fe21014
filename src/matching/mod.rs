//! Question matching primitives.
//!
//! Two building blocks used across the answer pipeline:
//!
//! - [`fuzzy`] — a pure string-similarity ratio for the fuzzy static-match
//!   tier, independent of the pipeline so it can be unit tested on its own.
//! - [`keywords`] — data-driven keyword tables for topic, intent and emotion
//!   detection. Categories map to substring sets rather than hand-coded
//!   branches so the vocabulary can be tuned in one place.

pub mod fuzzy;
pub mod keywords;

pub use fuzzy::sequence_ratio;
