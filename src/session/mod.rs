// Knowledge base session
// Owns the store, embedder, pipeline and retriever for one caller


use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::OllamaClient;
use crate::embeddings::provider::{
    DEFAULT_EMBED_TIMEOUT, DEFAULT_INIT_TIMEOUT, EmbeddingProvider, LazyEmbedder,
};
use crate::extractor::{Extractor, FileExtractor};
use crate::pipeline::{DEFAULT_EXTRACT_TIMEOUT, Document, IngestResult, IngestionPipeline};
use crate::retriever::{DEFAULT_TOP_K, Retriever, SearchResult};
use crate::store::VectorStore;
use crate::{RagError, Result};

/// Tunables for a [`KnowledgeBase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeBaseOptions {
    pub chunking: ChunkingConfig,
    /// Results returned by [`KnowledgeBase::search_default`]
    pub top_k: usize,
    pub embed_timeout: Duration,
    pub init_timeout: Duration,
    pub extract_timeout: Duration,
}

impl Default for KnowledgeBaseOptions {
    #[inline]
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
        }
    }
}

impl KnowledgeBaseOptions {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking,
            top_k: config.retrieval.top_k,
            embed_timeout: config.timeouts.embedding(),
            init_timeout: config.timeouts.initialization(),
            extract_timeout: config.timeouts.extraction(),
        }
    }
}

/// An in-memory knowledge base.
///
/// Everything lives as long as the value does; nothing is shared between
/// instances and nothing is persisted.
pub struct KnowledgeBase {
    embedder: Arc<LazyEmbedder>,
    store: Arc<VectorStore>,
    pipeline: IngestionPipeline,
    retriever: Retriever,
    top_k: usize,
}

impl KnowledgeBase {
    /// Build an Ollama-backed knowledge base and initialize its embedder
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let client = OllamaClient::new(&config.ollama)
            .context("Failed to create Ollama client")?
            .with_request_budget(config.timeouts.embedding());

        let knowledge_base = Self::with_provider(
            Arc::new(client),
            Arc::new(FileExtractor::new()),
            KnowledgeBaseOptions::from_config(config),
        )?;
        knowledge_base.initialize().await?;

        Ok(knowledge_base)
    }

    /// Assemble a knowledge base from explicit collaborators.
    ///
    /// The provider is not initialized until [`KnowledgeBase::initialize`] or
    /// the first embedding call.
    #[inline]
    pub fn with_provider(
        provider: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn Extractor>,
        options: KnowledgeBaseOptions,
    ) -> Result<Self> {
        let embedder = Arc::new(
            LazyEmbedder::new(provider)
                .with_embed_timeout(options.embed_timeout)
                .with_init_timeout(options.init_timeout),
        );
        let store = Arc::new(VectorStore::new());
        let pipeline = IngestionPipeline::new(
            extractor,
            Arc::clone(&embedder),
            Arc::clone(&store),
            options.chunking,
        )?
        .with_extract_timeout(options.extract_timeout);
        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));

        Ok(Self {
            embedder,
            store,
            pipeline,
            retriever,
            top_k: options.top_k,
        })
    }

    /// Initialize the embedding provider; a no-op once it succeeded
    #[inline]
    pub async fn initialize(&self) -> Result<()> {
        self.embedder
            .initialize()
            .await
            .map_err(|source| RagError::Embedding {
                context: format!("initializing provider {}", self.embedder.provider_name()),
                source,
            })
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.embedder.is_initialized()
    }

    #[inline]
    pub fn provider_name(&self) -> &str {
        self.embedder.provider_name()
    }

    /// Dimension of stored embeddings, once anything has been embedded
    #[inline]
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embedder.dimension()
    }

    #[inline]
    pub async fn add_document(&self, bytes: &[u8], filename: &str) -> Result<IngestResult> {
        self.pipeline.add_document(bytes, filename).await
    }

    #[inline]
    pub async fn add_document_with_progress(
        &self,
        bytes: &[u8],
        filename: &str,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<IngestResult> {
        self.pipeline
            .add_document_with_progress(bytes, filename, progress)
            .await
    }

    /// Read a file from disk and ingest it under its file name
    #[inline]
    pub async fn add_file(&self, path: &Path) -> Result<IngestResult> {
        let (bytes, filename) = read_document(path).await?;
        self.add_document(&bytes, &filename).await
    }

    #[inline]
    pub async fn add_file_with_progress(
        &self,
        path: &Path,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<IngestResult> {
        let (bytes, filename) = read_document(path).await?;
        self.add_document_with_progress(&bytes, &filename, progress)
            .await
    }

    #[inline]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        self.retriever.search(query, top_k).await
    }

    /// Search with the configured number of results
    #[inline]
    pub async fn search_default(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search(query, self.top_k).await
    }

    #[inline]
    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub async fn document_count(&self) -> usize {
        self.pipeline.document_count().await
    }

    #[inline]
    pub async fn chunk_count(&self) -> usize {
        self.store.count().await
    }

    #[inline]
    pub async fn documents(&self) -> Vec<Document> {
        self.pipeline.documents().await
    }

    /// Discard every document, chunk and embedding
    #[inline]
    pub async fn clear_all(&self) {
        self.pipeline.clear_all().await;
    }

    /// Release everything held by the knowledge base
    #[inline]
    pub async fn close(self) {
        let documents = self.document_count().await;
        self.clear_all().await;
        info!("Closed knowledge base ({} documents discarded)", documents);
    }
}

async fn read_document(path: &Path) -> Result<(Vec<u8>, String)> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} does not name a file", path.display()),
            )
        })?;
    let bytes = tokio::fs::read(path).await?;
    Ok((bytes, filename))
}
