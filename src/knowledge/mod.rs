//! Process-loaded knowledge base for semantic retrieval.
//!
//! Passages are produced offline (crawler + embedding job) and loaded once at
//! startup from a JSON Lines file, one record per line. The store is
//! immutable for the process lifetime and shared read-only across request
//! handlers; every passage carries a dense embedding of the same
//! dimensionality, enforced at load time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

/// A chunk of source text with its precomputed embedding.
#[derive(Debug, Clone)]
pub struct KnowledgePassage {
    /// The passage text handed to the generative prompt.
    pub text: String,
    /// Dense embedding produced by the configured embedding model.
    pub embedding: Vec<f32>,
    /// URL of the page or document the passage was extracted from.
    pub source_url: String,
    /// Optional human-readable label for the source.
    pub source_label: Option<String>,
}

/// On-disk record shape, as written by the embedding job.
#[derive(Debug, Deserialize)]
struct RawPassage {
    text: String,
    url: String,
    #[serde(default)]
    title: Option<String>,
    embedding: Vec<f32>,
}

/// Immutable, in-memory collection of knowledge passages.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    passages: Vec<KnowledgePassage>,
    dim: Option<usize>,
}

impl KnowledgeStore {
    /// An empty store. The service boots with one when no knowledge file is
    /// present; the retrieval tier then simply never fires.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from already-loaded passages.
    ///
    /// The first passage fixes the embedding dimensionality; any passage with
    /// a different dimensionality or empty text is skipped with a warning
    /// rather than poisoning retrieval later.
    pub fn from_passages(passages: Vec<KnowledgePassage>) -> Self {
        let mut store = Self::default();
        for passage in passages {
            store.push(passage);
        }
        store
    }

    /// Load a store from a JSON Lines file.
    ///
    /// A missing file yields an empty store (the service still answers from
    /// the static table); a malformed line is skipped with a warning.
    pub fn load_jsonl(path: &Path) -> Result<Self, anyhow::Error> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "knowledge file {} not found, starting with an empty store",
                    path.display()
                );
                return Ok(Self::empty());
            }
            Err(e) => return Err(e.into()),
        };

        let mut store = Self::default();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawPassage>(&line) {
                Ok(raw) => store.push(KnowledgePassage {
                    text: raw.text,
                    embedding: raw.embedding,
                    source_url: raw.url,
                    source_label: raw.title,
                }),
                Err(e) => {
                    log::warn!("skipping malformed knowledge record at line {}: {}", line_no + 1, e);
                }
            }
        }

        log::info!(
            "knowledge store loaded: {} passages, dim {:?}",
            store.len(),
            store.dim()
        );
        Ok(store)
    }

    fn push(&mut self, passage: KnowledgePassage) {
        if passage.text.trim().is_empty() {
            log::warn!("skipping knowledge passage with empty text ({})", passage.source_url);
            return;
        }
        match self.dim {
            None => self.dim = Some(passage.embedding.len()),
            Some(dim) if passage.embedding.len() != dim => {
                log::warn!(
                    "skipping knowledge passage with embedding dim {} (store dim {})",
                    passage.embedding.len(),
                    dim
                );
                return;
            }
            Some(_) => {}
        }
        self.passages.push(passage);
    }

    /// Number of passages in the store.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// True when the store holds no passages.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Embedding dimensionality shared by every passage; `None` when empty.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Passage at `index`, if in range.
    pub fn passage(&self, index: usize) -> Option<&KnowledgePassage> {
        self.passages.get(index)
    }

    /// All passages, in load order.
    pub fn passages(&self) -> &[KnowledgePassage] {
        &self.passages
    }
}
