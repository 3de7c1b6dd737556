//! Character-window text chunker with overlap.
//!
//! Splits record text into bounded, overlapping [`Chunk`]s: each chunk
//! consumes up to `max_chunk_size` characters, and every chunk after the
//! first starts `overlap` characters before the previous chunk's end, so
//! no phrase is lost to a split boundary.
//!
//! Splitting is character-based (not token-based) for language-agnostic
//! determinism: identical input and parameters always produce the
//! identical chunk sequence, which keeps derived chunk ids stable across
//! re-ingestion. All indices are `char` positions, never raw bytes, so
//! multibyte UTF-8 text splits cleanly.
//!
//! # Example
//!
//! ```rust
//! use ragmill::chunk::split;
//!
//! let chunks = split("doc1", "abcdefghij", 4, 1).unwrap();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! assert_eq!(chunks[1].overlap_with_predecessor, "d");
//! ```

use crate::error::PipelineError;
use crate::models::Chunk;

/// Split text into overlapping chunks of at most `max_chunk_size` characters.
///
/// Returns chunks with contiguous `sequence_index` starting at 0. Empty
/// input yields an empty sequence; whether that is an error is endpoint
/// policy, decided by the caller.
///
/// # Errors
///
/// `InvalidInput` when `max_chunk_size == 0` or `overlap >= max_chunk_size`.
///
/// # Guarantees
///
/// - Deterministic: same arguments, same chunk sequence.
/// - Coverage: stripping each chunk's `overlap_with_predecessor` prefix
///   and concatenating the remainders in order reconstructs the input.
/// - Chunk N+1 begins exactly `overlap` characters before chunk N's end.
pub fn split(
    source_id: &str,
    text: &str,
    max_chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, PipelineError> {
    if max_chunk_size == 0 {
        return Err(PipelineError::invalid_input("max_chunk_size must be > 0"));
    }
    if overlap >= max_chunk_size {
        return Err(PipelineError::invalid_input(format!(
            "overlap ({}) must be smaller than max_chunk_size ({})",
            overlap, max_chunk_size
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char start, plus the end sentinel, so slices
    // below always land on UTF-8 boundaries.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let end = (start + max_chunk_size).min(total_chars);
        let chunk_text = &text[offsets[start]..offsets[end]];
        let overlap_text = if index == 0 {
            ""
        } else {
            let overlap_end = (start + overlap).min(end);
            &text[offsets[start]..offsets[overlap_end]]
        };

        chunks.push(Chunk {
            source_id: source_id.to_string(),
            sequence_index: index,
            text: chunk_text.to_string(),
            overlap_with_predecessor: overlap_text.to_string(),
        });

        if end == total_chars {
            break;
        }
        start = end - overlap;
        index += 1;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<String> {
        chunks.iter().map(|c| c.text.clone()).collect()
    }

    #[test]
    fn test_exact_window_sequence() {
        let chunks = split("doc1", "abcdefghij", 4, 1).unwrap();
        assert_eq!(texts(&chunks), ["abcd", "defg", "ghij"]);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_index, i);
            assert_eq!(c.source_id, "doc1");
        }
    }

    #[test]
    fn test_overlap_prefix_matches_predecessor_tail() {
        let chunks = split("doc1", "abcdefghijklmno", 5, 2).unwrap();
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let tail: String = prev[prev.len() - 2..].iter().collect();
            assert_eq!(pair[1].overlap_with_predecessor, tail);
        }
    }

    #[test]
    fn test_coverage_reconstructs_input() {
        let input = "The quick brown fox jumps over the lazy dog, twice.";
        for (max, overlap) in [(7, 0), (7, 3), (10, 4), (100, 10)] {
            let chunks = split("doc1", input, max, overlap).unwrap();
            let mut rebuilt = String::new();
            for c in &chunks {
                let skip = c.overlap_with_predecessor.chars().count();
                rebuilt.extend(c.text.chars().skip(skip));
            }
            assert_eq!(rebuilt, input, "max={} overlap={}", max, overlap);
        }
    }

    #[test]
    fn test_empty_text_yields_empty_sequence() {
        let chunks = split("doc1", "", 10, 2).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split("doc1", "hi", 10, 2).unwrap();
        assert_eq!(texts(&chunks), ["hi"]);
        assert_eq!(chunks[0].overlap_with_predecessor, "");
        assert_eq!(chunks[0].derived_id(), "doc1:0");
    }

    #[test]
    fn test_deterministic() {
        let input = "determinism matters for idempotent re-ingestion";
        let a = split("doc1", input, 9, 3).unwrap();
        let b = split("doc1", input, 9, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_utf8() {
        let input = "héllo wörld ünïcode téxt";
        let chunks = split("doc1", input, 5, 2).unwrap();
        let mut rebuilt = String::new();
        for c in &chunks {
            assert!(c.text.chars().count() <= 5);
            let skip = c.overlap_with_predecessor.chars().count();
            rebuilt.extend(c.text.chars().skip(skip));
        }
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(split("doc1", "abc", 0, 0).is_err());
        assert!(split("doc1", "abc", 4, 4).is_err());
        assert!(split("doc1", "abc", 4, 5).is_err());
    }

    #[test]
    fn test_zero_overlap_partitions() {
        let chunks = split("doc1", "abcdefgh", 3, 0).unwrap();
        assert_eq!(texts(&chunks), ["abc", "def", "gh"]);
        assert!(chunks.iter().all(|c| c.overlap_with_predecessor.is_empty()));
    }
}
