// Ingestion pipeline
// Extract, chunk, embed and store one document at a time


use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embeddings::chunking::{ChunkingConfig, TextChunk, chunk_text};
use crate::embeddings::provider::LazyEmbedder;
use crate::extractor::{DocumentMetadata, ExtractedDocument, ExtractionError, Extractor};
use crate::store::{ChunkMetadata, VectorRecord, VectorStore};
use crate::{RagError, Result};

pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// A document that made it into the knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub metadata: DocumentMetadata,
    /// Extracted text the chunks were cut from
    pub text: String,
    pub chunk_count: usize,
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub document_id: Uuid,
    pub chunks_added: usize,
    pub metadata: DocumentMetadata,
}

/// Turns uploaded documents into stored, searchable chunks.
///
/// A document is either stored in full or not at all: every chunk is embedded
/// before anything is appended to the store.
pub struct IngestionPipeline {
    extractor: Arc<dyn Extractor>,
    embedder: Arc<LazyEmbedder>,
    store: Arc<VectorStore>,
    chunking: ChunkingConfig,
    extract_timeout: Duration,
    documents: RwLock<Vec<Document>>,
}

impl IngestionPipeline {
    /// Create a pipeline, rejecting an invalid chunking configuration up front
    #[inline]
    pub fn new(
        extractor: Arc<dyn Extractor>,
        embedder: Arc<LazyEmbedder>,
        store: Arc<VectorStore>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        chunking.validate()?;

        Ok(Self {
            extractor,
            embedder,
            store,
            chunking,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
            documents: RwLock::new(Vec::new()),
        })
    }

    #[inline]
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }

    #[inline]
    pub fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    #[inline]
    pub async fn add_document(&self, bytes: &[u8], filename: &str) -> Result<IngestResult> {
        self.add_document_with_progress(bytes, filename, &|_, _| {})
            .await
    }

    /// Ingest a document, calling `progress(embedded, total)` after each chunk
    #[inline]
    pub async fn add_document_with_progress(
        &self,
        bytes: &[u8],
        filename: &str,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<IngestResult> {
        if self.contains(filename).await {
            return Err(RagError::DuplicateDocument {
                filename: filename.to_string(),
            });
        }

        let extracted = self.extract(bytes, filename).await?;
        if extracted.text.trim().is_empty() {
            return Err(RagError::EmptyInput {
                context: format!("no text could be extracted from '{}'", filename),
            });
        }

        let chunks = chunk_text(&extracted.text, &self.chunking)?;
        info!(
            "Ingesting {} ({} pages, {} chunks)",
            filename,
            extracted.metadata.page_count,
            chunks.len()
        );

        let document_id = Uuid::new_v4();
        let records = self
            .embed_chunks(document_id, &extracted.metadata, &chunks, progress)
            .await?;
        let chunks_added = records.len();

        // Registry and store change together so counts never disagree
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.metadata.filename == filename) {
            return Err(RagError::DuplicateDocument {
                filename: filename.to_string(),
            });
        }
        self.store.append(records).await?;
        documents.push(Document {
            id: document_id,
            metadata: extracted.metadata.clone(),
            text: extracted.text,
            chunk_count: chunks_added,
        });
        drop(documents);

        info!("Added {} with {} chunks", filename, chunks_added);

        Ok(IngestResult {
            document_id,
            chunks_added,
            metadata: extracted.metadata,
        })
    }

    /// Number of ingested documents
    #[inline]
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Metadata of every ingested document, in ingestion order
    #[inline]
    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    #[inline]
    pub async fn contains(&self, filename: &str) -> bool {
        self.documents
            .read()
            .await
            .iter()
            .any(|d| d.metadata.filename == filename)
    }

    /// Drop every document and every stored chunk
    #[inline]
    pub async fn clear_all(&self) {
        let mut documents = self.documents.write().await;
        let removed = documents.len();
        documents.clear();
        self.store.clear().await;
        info!("Cleared {} documents", removed);
    }

    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<ExtractedDocument> {
        let extractor = Arc::clone(&self.extractor);
        let owned_bytes = bytes.to_vec();
        let owned_name = filename.to_string();
        let task =
            tokio::task::spawn_blocking(move || extractor.extract(&owned_bytes, &owned_name));

        let joined = tokio::time::timeout(self.extract_timeout, task)
            .await
            .map_err(|_| RagError::Extraction {
                filename: filename.to_string(),
                source: ExtractionError::Timeout(self.extract_timeout),
            })?;

        joined
            .map_err(|e| anyhow!("extraction task for '{}' failed: {}", filename, e))?
            .map_err(|source| {
                warn!("Failed to extract {}: {}", filename, source);
                RagError::Extraction {
                    filename: filename.to_string(),
                    source,
                }
            })
    }

    /// Embed chunks in order; the first failure rejects the whole document
    async fn embed_chunks(
        &self,
        document_id: Uuid,
        metadata: &DocumentMetadata,
        chunks: &[TextChunk],
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<Vec<VectorRecord>> {
        let mut records = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text).await.map_err(|source| {
                warn!(
                    "Embedding chunk {} of {} failed, rejecting document: {}",
                    chunk.chunk_index, metadata.filename, source
                );
                RagError::Embedding {
                    context: format!(
                        "'{}' chunk {}/{}",
                        metadata.filename,
                        chunk.chunk_index + 1,
                        chunk.total_chunks
                    ),
                    source,
                }
            })?;

            debug!(
                "Embedded chunk {}/{} of {} (words {}..{})",
                chunk.chunk_index + 1,
                chunk.total_chunks,
                metadata.filename,
                chunk.start_word,
                chunk.end_word
            );

            records.push(VectorRecord {
                id: VectorRecord::chunk_id(&metadata.filename, chunk.chunk_index),
                text: chunk.text.clone(),
                embedding,
                metadata: ChunkMetadata {
                    document_id,
                    filename: metadata.filename.clone(),
                    page_count: metadata.page_count,
                    uploaded_at: metadata.uploaded_at,
                    chunk_index: chunk.chunk_index,
                    total_chunks: chunk.total_chunks,
                },
            });
            progress(records.len(), chunks.len());
        }

        Ok(records)
    }
}
