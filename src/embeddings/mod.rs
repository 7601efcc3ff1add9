// Embeddings module
// Chunking of document text and the embedding provider boundary

pub mod chunking;
pub mod ollama;
pub mod provider;

pub use chunking::{ChunkingConfig, ChunkingConfigError, TextChunk, chunk_text, word_count};
pub use ollama::OllamaClient;
pub use provider::{EmbeddingError, EmbeddingProvider, LazyEmbedder};
