use criterion::{Criterion, criterion_group, criterion_main};
use doc_rag::extractor::{Extractor, FileExtractor};
use std::fmt::Write as _;
use std::hint::black_box;

fn generate_page(sections: usize) -> String {
    let mut page = String::from(
        "<html><head><title>Labour code</title><style>p { color: red; }</style></head><body>\
         <nav><a href=\"/\">Home</a></nav><main>",
    );
    for i in 0..sections {
        let _ = write!(
            page,
            "<h2>Article {i}</h2><p>Every worker is entitled to <b>{i}</b> days of leave \
             after completing a <em>full</em> year of service.</p>\
             <ul><li>Notice period</li><li>Termination</li></ul>"
        );
    }
    page.push_str("</main><footer>Published by the ministry</footer></body></html>");
    page
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let page = generate_page(2_000);
    let extractor = FileExtractor::new();
    c.bench_function("extraction", |b| {
        b.iter(|| extractor.extract(black_box(page.as_bytes()), black_box("labour.html")))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
