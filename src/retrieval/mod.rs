//! Cosine-similarity retrieval over the knowledge store.
//!
//! The retriever embeds the query through the configured provider and ranks
//! every stored passage by cosine similarity. It is deliberately defensive:
//! an empty store, a failed embedding call, or a dimensionality disagreement
//! between the live embedding model and the stored knowledge base all return
//! empty results — retrieval problems must never fail a request, they just
//! hand the question to the next tier.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::knowledge::KnowledgeStore;
use crate::providers::EmbeddingProvider;

/// Epsilon added to both norms so zero vectors never divide by zero.
const NORM_EPSILON: f32 = 1e-10;

/// One ranked retrieval hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPassage {
    /// Index into the knowledge store.
    pub index: usize,
    /// Cosine similarity against the query embedding.
    pub similarity: f32,
}

/// Top-k semantic search over a shared, read-only knowledge store.
pub struct VectorRetriever {
    store: Arc<KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorRetriever {
    pub fn new(store: Arc<KnowledgeStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Return up to `k` passages ranked by descending cosine similarity.
    ///
    /// Empty on: empty store, embedding failure, or query dimensionality not
    /// matching the store's. Each condition is logged for operators.
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredPassage> {
        if self.store.is_empty() || k == 0 {
            return Vec::new();
        }

        let query_vec = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("query embedding failed, skipping retrieval: {e}");
                return Vec::new();
            }
        };

        if self.store.dim() != Some(query_vec.len()) {
            log::warn!(
                "skipping retrieval due to embedding dim mismatch (store: {:?}, query: {})",
                self.store.dim(),
                query_vec.len()
            );
            return Vec::new();
        }

        let similarities: Vec<f32> = self
            .store
            .passages()
            .iter()
            .map(|p| cosine_similarity(&query_vec, &p.embedding))
            .collect();

        top_k_descending(&similarities, k)
    }
}

/// Cosine similarity of two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    dot / (norm_a * norm_b)
}

/// Indices of the `k` largest similarities, sorted descending.
///
/// Uses a partial selection when `k` is smaller than the corpus so ranking
/// the long tail is never paid for; ties fall wherever the unstable sort
/// leaves them.
fn top_k_descending(similarities: &[f32], k: usize) -> Vec<ScoredPassage> {
    let mut indices: Vec<usize> = (0..similarities.len()).collect();

    let by_descending_similarity = |&i: &usize, &j: &usize| {
        similarities[j]
            .partial_cmp(&similarities[i])
            .unwrap_or(Ordering::Equal)
    };

    if k < indices.len() {
        indices.select_nth_unstable_by(k, by_descending_similarity);
        indices.truncate(k);
    }
    indices.sort_unstable_by(by_descending_similarity);

    indices
        .into_iter()
        .map(|index| ScoredPassage {
            index,
            similarity: similarities[index],
        })
        .collect()
}
