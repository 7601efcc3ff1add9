#[cfg(test)]
mod tests;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    #[error("provider initialization failed: {0}")]
    Initialization(String),
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),
    #[error("embedding dimension changed from {expected} to {actual}")]
    DimensionChanged { expected: usize, actual: usize },
    #[error("provider returned an empty embedding")]
    EmptyEmbedding,
}

/// Source of fixed-length, L2-normalized text embeddings.
///
/// `initialize` may be slow (model loading, server checks) and is invoked at
/// most once by [`LazyEmbedder`]. Implementations do not retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human readable identifier used in logs
    fn name(&self) -> &str;

    async fn initialize(&self) -> Result<(), EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Wraps a provider with guarded one-time initialization, per-call timeouts
/// and a dimension check across calls.
pub struct LazyEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    initialized: OnceCell<()>,
    dimension: OnceLock<usize>,
    embed_timeout: Duration,
    init_timeout: Duration,
}

impl std::fmt::Debug for LazyEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEmbedder")
            .field("provider", &self.provider.name())
            .field("initialized", &self.is_initialized())
            .field("dimension", &self.dimension())
            .field("embed_timeout", &self.embed_timeout)
            .field("init_timeout", &self.init_timeout)
            .finish()
    }
}

impl LazyEmbedder {
    #[inline]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            initialized: OnceCell::new(),
            dimension: OnceLock::new(),
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    #[inline]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    #[inline]
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    #[inline]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Dimension of the vectors produced so far, if any were produced
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Initialize the provider if that has not happened yet.
    ///
    /// Concurrent callers wait on the single in-flight initialization. A
    /// failed attempt is not remembered, so a later call tries again.
    #[inline]
    pub async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.initialized
            .get_or_try_init(|| async {
                info!("Initializing embedding provider {}", self.provider.name());
                match tokio::time::timeout(self.init_timeout, self.provider.initialize()).await {
                    Ok(Ok(())) => {
                        info!("Embedding provider {} ready", self.provider.name());
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        warn!(
                            "Embedding provider {} failed to initialize: {}",
                            self.provider.name(),
                            e
                        );
                        Err(e)
                    }
                    Err(_) => Err(EmbeddingError::Timeout(self.init_timeout)),
                }
            })
            .await
            .map(|_| ())
    }

    /// Embed `text`, initializing the provider first if needed
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.initialize().await?;

        let embedding = tokio::time::timeout(self.embed_timeout, self.provider.embed(text))
            .await
            .map_err(|_| EmbeddingError::Timeout(self.embed_timeout))??;

        if embedding.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }
        if let Some(position) = embedding.iter().position(|v| !v.is_finite()) {
            warn!(
                "{} returned a non-finite value at position {}",
                self.provider.name(),
                position
            );
            return Err(EmbeddingError::InvalidResponse(format!(
                "non-finite value at position {}",
                position
            )));
        }

        let expected = *self.dimension.get_or_init(|| embedding.len());
        if expected != embedding.len() {
            return Err(EmbeddingError::DimensionChanged {
                expected,
                actual: embedding.len(),
            });
        }

        debug!(
            "Embedded {} bytes of text into {} dimensions",
            text.len(),
            embedding.len()
        );
        Ok(embedding)
    }
}
