#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_OVERLAP: usize = 50;

/// A word-aligned window of a document's text, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The window's words joined by single spaces
    pub text: String,
    /// Offset of the first word within the document (inclusive)
    pub start_word: usize,
    /// Offset one past the last word within the document (exclusive)
    pub end_word: usize,
    /// Position of this chunk within the document
    pub chunk_index: usize,
    /// Number of chunks produced for the document
    pub total_chunks: usize,
}

impl TextChunk {
    #[inline]
    pub fn word_len(&self) -> usize {
        self.end_word - self.start_word
    }
}

/// Configuration for word-window chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per window
    pub chunk_size: usize,
    /// Words repeated from the end of the previous window
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingConfigError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ChunkingConfigError> {
        self.step().map(|_| ())
    }

    /// Distance between the starts of two consecutive windows
    #[inline]
    pub fn step(&self) -> Result<usize, ChunkingConfigError> {
        if self.chunk_size == 0 {
            return Err(ChunkingConfigError::ZeroChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkingConfigError::OverlapTooLarge {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(self.chunk_size - self.overlap)
    }
}

/// Split text into overlapping windows of whitespace-separated words.
///
/// Windows start at `0, step, 2 * step, ...` while the start is inside the
/// text, and each ends at `min(start + chunk_size, word_count)`, so the last
/// window may be short.
#[inline]
pub fn chunk_text(
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<TextChunk>, ChunkingConfigError> {
    let step = config.step()?;
    let words = text.split_whitespace().collect::<Vec<_>>();

    let mut chunks = (0..words.len())
        .step_by(step)
        .filter_map(|start| {
            let end = (start + config.chunk_size).min(words.len());
            let joined = words[start..end].join(" ");
            if joined.trim().is_empty() {
                return None;
            }
            Some(TextChunk {
                text: joined,
                start_word: start,
                end_word: end,
                chunk_index: 0,
                total_chunks: 0,
            })
        })
        .collect::<Vec<_>>();

    let total_chunks = chunks.len();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.chunk_index = i;
        chunk.total_chunks = total_chunks;
    }

    debug!(
        "Chunked {} words into {} chunks (size {}, overlap {})",
        words.len(),
        total_chunks,
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}

/// Number of whitespace-separated words in `text`
#[inline]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
