use thiserror::Error;

use crate::chat::ChatError;
use crate::embeddings::chunking::ChunkingConfigError;
use crate::embeddings::provider::EmbeddingError;
use crate::extractor::ExtractionError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Extraction error for '{filename}': {source}")]
    Extraction {
        filename: String,
        #[source]
        source: ExtractionError,
    },

    #[error("Embedding error for {context}: {source}")]
    Embedding {
        context: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Chunking configuration error: {0}")]
    ChunkingConfig(#[from] ChunkingConfigError),

    #[error("Empty input: {context}")]
    EmptyInput { context: String },

    #[error("Document '{filename}' has already been added")]
    DuplicateDocument { filename: String },

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extractor;
pub mod pipeline;
pub mod retriever;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_utils;

pub use pipeline::{IngestResult, IngestionPipeline};
pub use retriever::{Retriever, SearchResult};
pub use session::{KnowledgeBase, KnowledgeBaseOptions};
pub use store::{ChunkMetadata, VectorRecord, VectorStore};
