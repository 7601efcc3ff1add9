// In-memory vector store
// Append-only collection of embedded chunks with snapshot reads


use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Metadata stored alongside every chunk embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// ID of the document this chunk was cut from
    pub document_id: Uuid,
    /// Name of the uploaded file
    pub filename: String,
    /// Number of pages in the source document
    pub page_count: u32,
    /// When the source document was ingested
    pub uploaded_at: DateTime<Utc>,
    /// Index of this chunk within its document
    pub chunk_index: usize,
    /// Number of chunks in the document
    pub total_chunks: usize,
}

/// A chunk together with its embedding, the unit stored and searched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// `<filename>-chunk-<index>`
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    #[inline]
    pub fn chunk_id(filename: &str, chunk_index: usize) -> String {
        format!("{}-chunk-{}", filename, chunk_index)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record '{id}' has an empty embedding")]
    EmptyEmbedding { id: String },
    #[error("record '{id}' has dimension {actual}, store expects {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },
    #[error("record '{id}' has a non-finite value at position {position}")]
    NonFiniteEmbedding { id: String, position: usize },
    #[error("record id '{0}' is already present")]
    DuplicateId(String),
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<Arc<VectorRecord>>,
    ids: HashSet<String>,
    dimension: Option<usize>,
}

/// Vector store shared between ingestion and retrieval.
///
/// Appends are all-or-nothing: a batch is validated in full before any record
/// becomes visible, and readers get a consistent snapshot of whole records.
#[derive(Debug, Default)]
pub struct VectorStore {
    state: RwLock<StoreState>,
}

impl VectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of records, or none of them if any record is invalid
    #[inline]
    pub async fn append(&self, records: Vec<VectorRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            debug!("No records to append");
            return Ok(());
        }

        let mut state = self.state.write().await;

        let expected = state.dimension.unwrap_or_else(|| records[0].dimension());
        let mut batch_ids = HashSet::with_capacity(records.len());
        for record in &records {
            if record.embedding.is_empty() {
                return Err(StoreError::EmptyEmbedding {
                    id: record.id.clone(),
                });
            }
            if let Some(position) = record.embedding.iter().position(|v| !v.is_finite()) {
                return Err(StoreError::NonFiniteEmbedding {
                    id: record.id.clone(),
                    position,
                });
            }
            if record.dimension() != expected {
                return Err(StoreError::DimensionMismatch {
                    id: record.id.clone(),
                    expected,
                    actual: record.dimension(),
                });
            }
            if state.ids.contains(&record.id) || !batch_ids.insert(record.id.as_str()) {
                return Err(StoreError::DuplicateId(record.id.clone()));
            }
        }
        drop(batch_ids);

        let added = records.len();
        state.dimension = Some(expected);
        state.ids.extend(records.iter().map(|r| r.id.clone()));
        state.records.extend(records.into_iter().map(Arc::new));

        debug!(
            "Appended {} records ({} total, {} dimensions)",
            added,
            state.records.len(),
            expected
        );
        Ok(())
    }

    /// Snapshot of every record in insertion order
    #[inline]
    pub async fn all(&self) -> Vec<Arc<VectorRecord>> {
        self.state.read().await.records.clone()
    }

    #[inline]
    pub async fn count(&self) -> usize {
        self.state.read().await.records.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.count().await == 0
    }

    /// Dimension shared by every stored embedding, once something was stored
    #[inline]
    pub async fn dimension(&self) -> Option<usize> {
        self.state.read().await.dimension
    }

    /// Remove every record and forget the pinned dimension
    #[inline]
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let removed = state.records.len();
        *state = StoreState::default();
        info!("Cleared vector store ({} records removed)", removed);
    }
}
