use super::*;
use crate::test_utils::{TEST_DIMENSION, TestEmbedder};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinSet;

#[tokio::test]
async fn initialize_is_idempotent() {
    let provider = Arc::new(TestEmbedder::new());
    let embedder = LazyEmbedder::new(provider.clone());

    assert!(!embedder.is_initialized());
    embedder.initialize().await.expect("initialize should succeed");
    embedder.initialize().await.expect("initialize should succeed");
    embedder.initialize().await.expect("initialize should succeed");

    assert!(embedder.is_initialized());
    assert_eq!(provider.init_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_initialization_runs_once() {
    let provider = Arc::new(TestEmbedder::new().with_init_delay(Duration::from_millis(50)));
    let embedder = Arc::new(LazyEmbedder::new(provider.clone()));

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let embedder = Arc::clone(&embedder);
        tasks.spawn(async move { embedder.initialize().await });
    }
    while let Some(result) = tasks.join_next().await {
        result
            .expect("task should not panic")
            .expect("initialize should succeed");
    }

    assert_eq!(provider.init_calls(), 1);
}

#[tokio::test]
async fn embed_initializes_on_first_use() {
    let provider = Arc::new(TestEmbedder::new());
    let embedder = LazyEmbedder::new(provider.clone());

    let vector = embedder
        .embed("first use")
        .await
        .expect("embed should succeed");

    assert_eq!(vector.len(), TEST_DIMENSION);
    assert_eq!(provider.init_calls(), 1);
    assert_eq!(provider.embed_calls(), 1);
    assert_eq!(embedder.dimension(), Some(TEST_DIMENSION));
}

#[tokio::test]
async fn dimension_is_constant_across_calls() {
    let embedder = LazyEmbedder::new(Arc::new(TestEmbedder::new()));

    let a = embedder
        .embed("the quick brown fox")
        .await
        .expect("embed should succeed");
    let b = embedder
        .embed("an entirely different sentence about legal matters")
        .await
        .expect("embed should succeed");

    assert_eq!(a.len(), b.len());
}

#[tokio::test]
async fn failed_initialization_is_retried_on_next_call() {
    let provider = Arc::new(TestEmbedder::new().failing_initialization());
    let embedder = LazyEmbedder::new(provider.clone());

    let first = embedder.initialize().await;
    assert!(matches!(first, Err(EmbeddingError::Initialization(_))));
    assert!(!embedder.is_initialized());

    let second = embedder.embed("anything").await;
    assert!(matches!(second, Err(EmbeddingError::Initialization(_))));
    assert_eq!(provider.init_calls(), 2);
    assert_eq!(provider.embed_calls(), 0);
}

#[tokio::test]
async fn slow_embedding_times_out() {
    let provider = Arc::new(TestEmbedder::new().with_embed_delay(Duration::from_millis(500)));
    let embedder = LazyEmbedder::new(provider).with_embed_timeout(Duration::from_millis(20));

    let result = embedder.embed("too slow").await;
    assert_eq!(
        result,
        Err(EmbeddingError::Timeout(Duration::from_millis(20)))
    );
}

#[tokio::test]
async fn slow_initialization_times_out() {
    let provider = Arc::new(TestEmbedder::new().with_init_delay(Duration::from_millis(500)));
    let embedder = LazyEmbedder::new(provider).with_init_timeout(Duration::from_millis(20));

    let result = embedder.initialize().await;
    assert_eq!(
        result,
        Err(EmbeddingError::Timeout(Duration::from_millis(20)))
    );
}

/// Returns a longer vector on every call
struct GrowingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for GrowingProvider {
    fn name(&self) -> &str {
        "growing"
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.5; 4 + call])
    }
}

#[tokio::test]
async fn dimension_change_is_rejected() {
    let embedder = LazyEmbedder::new(Arc::new(GrowingProvider {
        calls: AtomicUsize::new(0),
    }));

    embedder.embed("one").await.expect("first embed should succeed");
    let result = embedder.embed("two").await;

    assert_eq!(
        result,
        Err(EmbeddingError::DimensionChanged {
            expected: 4,
            actual: 5
        })
    );
}

#[tokio::test]
async fn empty_embedding_is_rejected() {
    let embedder = LazyEmbedder::new(Arc::new(TestEmbedder::new().with_dimension(0)));

    let result = embedder.embed("nothing").await;
    assert_eq!(result, Err(EmbeddingError::EmptyEmbedding));
    assert_eq!(embedder.dimension(), None);
}

/// Returns a vector poisoned with a NaN or an infinity
struct NonFiniteProvider {
    value: f32,
}

#[async_trait]
impl EmbeddingProvider for NonFiniteProvider {
    fn name(&self) -> &str {
        "non-finite"
    }

    async fn initialize(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.5, self.value, 0.5])
    }
}

#[tokio::test]
async fn non_finite_embedding_is_rejected() {
    for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let embedder = LazyEmbedder::new(Arc::new(NonFiniteProvider { value }));

        let result = embedder.embed("poisoned").await;

        assert_eq!(
            result,
            Err(EmbeddingError::InvalidResponse(
                "non-finite value at position 1".to_string()
            ))
        );
        assert_eq!(embedder.dimension(), None);
    }
}
