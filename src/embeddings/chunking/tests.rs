use super::*;

fn numbered_words(count: usize) -> String {
    (0..count)
        .map(|i| format!("w{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn default_config() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 500);
    assert_eq!(config.overlap, 50);
    assert_eq!(config.step(), Ok(450));
}

#[test]
fn empty_text() {
    let chunks = chunk_text("", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());

    let chunks =
        chunk_text(" \n\t  \n", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn short_text_is_single_chunk() {
    let text = numbered_words(120);
    let chunks = chunk_text(&text, &ChunkingConfig::default()).expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_word, 0);
    assert_eq!(chunks[0].end_word, 120);
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].total_chunks, 1);
}

#[test]
fn chunk_count_matches_step_division() {
    let config = ChunkingConfig::default();
    for words in [1, 50, 449, 450, 451, 500, 899, 900, 1000, 2000, 4501] {
        let chunks = chunk_text(&numbered_words(words), &config).expect("chunking should succeed");
        assert_eq!(
            chunks.len(),
            words.div_ceil(450),
            "unexpected chunk count for {} words",
            words
        );
    }
}

#[test]
fn text_between_step_and_chunk_size_gets_a_short_trailing_window() {
    let text = numbered_words(460);
    let chunks = chunk_text(&text, &ChunkingConfig::default()).expect("chunking should succeed");

    assert_eq!(chunks.len(), 2);
    assert_eq!((chunks[0].start_word, chunks[0].end_word), (0, 460));
    assert_eq!((chunks[1].start_word, chunks[1].end_word), (450, 460));
    assert_eq!(chunks[1].word_len(), 10);
    assert!(chunks[1].text.starts_with("w450 "));
    assert!(chunks[1].text.ends_with(" w459"));
    assert!(chunks.iter().all(|c| c.total_chunks == 2));
}

#[test]
fn overlapping_windows() {
    let text = numbered_words(1000);
    let chunks = chunk_text(&text, &ChunkingConfig::default()).expect("chunking should succeed");

    let ranges = chunks
        .iter()
        .map(|c| (c.start_word, c.end_word))
        .collect::<Vec<_>>();
    assert_eq!(ranges, vec![(0, 500), (450, 950), (900, 1000)]);

    for pair in chunks.windows(2) {
        let previous = pair[0].text.split_whitespace().collect::<Vec<_>>();
        let current = pair[1].text.split_whitespace().collect::<Vec<_>>();
        assert_eq!(&previous[previous.len() - 50..], &current[..50]);
    }
}

#[test]
fn chunk_indices_and_offsets() {
    let text = numbered_words(1337);
    let chunks = chunk_text(&text, &ChunkingConfig::default()).expect("chunking should succeed");
    let total = word_count(&text);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.total_chunks, chunks.len());
        assert!(chunk.start_word < chunk.end_word);
        assert!(chunk.end_word <= total);
        assert_eq!(word_count(&chunk.text), chunk.word_len());
    }
}

#[test]
fn irregular_whitespace_is_normalized() {
    let text = "alpha\n\n  beta\tgamma   delta\r\nepsilon";
    let config = ChunkingConfig {
        chunk_size: 3,
        overlap: 1,
    };
    let chunks = chunk_text(text, &config).expect("chunking should succeed");

    let texts = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>();
    assert_eq!(texts, vec!["alpha beta gamma", "gamma delta epsilon", "epsilon"]);
}

#[test]
fn rejects_overlap_not_smaller_than_chunk_size() {
    let equal = ChunkingConfig {
        chunk_size: 50,
        overlap: 50,
    };
    assert_eq!(
        chunk_text("some words", &equal),
        Err(ChunkingConfigError::OverlapTooLarge {
            chunk_size: 50,
            overlap: 50
        })
    );

    let larger = ChunkingConfig {
        chunk_size: 10,
        overlap: 20,
    };
    assert!(larger.validate().is_err());
}

#[test]
fn rejects_zero_chunk_size() {
    let config = ChunkingConfig {
        chunk_size: 0,
        overlap: 0,
    };
    assert_eq!(config.validate(), Err(ChunkingConfigError::ZeroChunkSize));
}

#[test]
fn zero_overlap_produces_disjoint_windows() {
    let config = ChunkingConfig {
        chunk_size: 4,
        overlap: 0,
    };
    let chunks = chunk_text(&numbered_words(10), &config).expect("chunking should succeed");
    let ranges = chunks
        .iter()
        .map(|c| (c.start_word, c.end_word))
        .collect::<Vec<_>>();
    assert_eq!(ranges, vec![(0, 4), (4, 8), (8, 10)]);
}
