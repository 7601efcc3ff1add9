use criterion::{Criterion, criterion_group, criterion_main};
use doc_rag::embeddings::chunking::{ChunkingConfig, chunk_text};
use std::hint::black_box;

const VOCABULARY: &[&str] = &[
    "article", "worker", "employer", "contract", "leave", "wages", "hours", "shall", "the", "of",
    "every", "annual", "notice", "period", "termination", "days",
];

fn generate_text(words: usize) -> String {
    (0..words)
        .map(|i| VOCABULARY[(i * 7 + i / 3) % VOCABULARY.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let content = generate_text(50_000);
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&content), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
