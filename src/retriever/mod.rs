
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::embeddings::provider::LazyEmbedder;
use crate::store::{ChunkMetadata, StoreError, VectorRecord, VectorStore};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// A stored chunk ranked against a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query, in [-1, 1]
    pub similarity: f32,
}

impl SearchResult {
    fn from_record(record: &VectorRecord, similarity: f32) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
            similarity,
        }
    }
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Accumulates in f64 and clamps to [-1, 1]. Returns 0.0 when either vector
/// has zero magnitude, the lengths differ or a value is not finite.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, norm_a, norm_b), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (x.mul_add(y, dot), x.mul_add(x, norm_a), y.mul_add(y, norm_b))
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !similarity.is_finite() {
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0) as f32
}

/// Strategy for ordering stored records against a query vector
pub trait SimilarityRanker: Send + Sync {
    /// The `top_k` best records, highest similarity first
    fn rank(
        &self,
        query: &[f32],
        records: &[Arc<VectorRecord>],
        top_k: usize,
    ) -> Vec<(Arc<VectorRecord>, f32)>;
}

/// Brute-force linear scan over every record.
///
/// Ties keep insertion order, so results are deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactRanker;

impl SimilarityRanker for ExactRanker {
    #[inline]
    fn rank(
        &self,
        query: &[f32],
        records: &[Arc<VectorRecord>],
        top_k: usize,
    ) -> Vec<(Arc<VectorRecord>, f32)> {
        let mut scored = records
            .iter()
            .map(|record| (Arc::clone(record), cosine_similarity(query, &record.embedding)))
            .collect::<Vec<_>>();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}

/// Finds the stored chunks most similar to a query
pub struct Retriever {
    embedder: Arc<LazyEmbedder>,
    store: Arc<VectorStore>,
    ranker: Box<dyn SimilarityRanker>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<LazyEmbedder>, store: Arc<VectorStore>) -> Self {
        Self::with_ranker(embedder, store, Box::new(ExactRanker))
    }

    #[inline]
    pub fn with_ranker(
        embedder: Arc<LazyEmbedder>,
        store: Arc<VectorStore>,
        ranker: Box<dyn SimilarityRanker>,
    ) -> Self {
        Self {
            embedder,
            store,
            ranker,
        }
    }

    /// Rank every stored chunk against `query` and return the best `top_k`.
    ///
    /// An empty store or `top_k == 0` returns immediately without calling
    /// the embedding provider. A blank query against a non-empty store is
    /// rejected with [`RagError::EmptyInput`].
    #[inline]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let records = self.store.all().await;
        if records.is_empty() || top_k == 0 {
            debug!(
                "Skipping search: {} records, top_k {}",
                records.len(),
                top_k
            );
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RagError::EmptyInput {
                context: "search query".to_string(),
            });
        }

        let query_vector =
            self.embedder
                .embed(query)
                .await
                .map_err(|source| RagError::Embedding {
                    context: format!("query '{}'", query),
                    source,
                })?;

        let expected = records[0].dimension();
        if query_vector.len() != expected {
            return Err(StoreError::DimensionMismatch {
                id: "query".to_string(),
                expected,
                actual: query_vector.len(),
            }
            .into());
        }

        let results = self
            .ranker
            .rank(&query_vector, &records, top_k)
            .into_iter()
            .map(|(record, similarity)| SearchResult::from_record(&record, similarity))
            .collect::<Vec<_>>();

        debug!(
            "Search over {} records returned {} results (best similarity {:?})",
            records.len(),
            results.len(),
            results.first().map(|r| r.similarity)
        );

        Ok(results)
    }
}
