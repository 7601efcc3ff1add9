//! Deterministic embedding providers for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::embeddings::provider::{EmbeddingError, EmbeddingProvider};

pub const TEST_DIMENSION: usize = 64;

/// Bag-of-words hashing embedder: identical word multisets map to identical
/// unit vectors, and texts sharing words point in similar directions.
#[derive(Debug, Default)]
pub struct TestEmbedder {
    dimension: usize,
    fail_marker: Option<String>,
    fail_initialization: bool,
    init_delay: Option<Duration>,
    embed_delay: Option<Duration>,
    init_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl TestEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: TEST_DIMENSION,
            ..Self::default()
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Fail every embed call whose text contains `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn failing_initialization(mut self) -> Self {
        self.fail_initialization = true;
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub fn with_embed_delay(mut self, delay: Duration) -> Self {
        self.embed_delay = Some(delay);
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for TestEmbedder {
    fn name(&self) -> &str {
        "test-embedder"
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_initialization {
            return Err(EmbeddingError::Initialization(
                "model could not be loaded".to_string(),
            ));
        }
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.embed_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(EmbeddingError::Request(format!(
                    "refusing to embed text containing {}",
                    marker
                )));
            }
        }
        Ok(hash_embedding(text, self.dimension))
    }
}

/// Normalized bag-of-words vector with one FNV-1a bucket per word
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    if dimension == 0 {
        return Vec::new();
    }

    let mut vector = vec![0.0_f32; dimension];
    for word in text.split_whitespace() {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        vector[(hash % dimension as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}
