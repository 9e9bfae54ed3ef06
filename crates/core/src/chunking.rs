use crate::error::{EngineError, Result};
use crate::models::{Chunk, EngineOptions};
use sha2::{Digest, Sha256};

/// Separator ladder, coarsest to finest. The empty string means "split into
/// individual characters" and guarantees the recursion always terminates.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl SplitterConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(EngineError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(EngineError::Config(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl TryFrom<EngineOptions> for SplitterConfig {
    type Error = EngineError;

    fn try_from(value: EngineOptions) -> Result<Self> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

/// Splits `text` into an ordered sequence of chunks of at most
/// `config.chunk_size` characters, where each chunk after the first carries
/// the trailing pieces of its predecessor covering at least
/// `config.overlap` characters. Deterministic and pure: identical inputs
/// always produce the identical sequence, which is what makes re-ingestion
/// overwrite instead of duplicate.
pub fn split_text(text: &str, config: SplitterConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let pieces = split_by_ladder(text, config.chunk_size, &SEPARATORS);
    merge_with_overlap(pieces, config.chunk_size, config.overlap)
}

/// Derives the stable identifier for a `(source_name, chunk_text)` pair:
/// the source name followed by a sha256 hex digest of the chunk text.
/// Content-hash based, so ids are reproducible across process restarts.
pub fn chunk_id(source_name: &str, chunk_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk_text.as_bytes());
    format!("{}-{:x}", source_name, hasher.finalize())
}

/// Splits a whole document and assigns ids and sequence positions.
/// Whitespace-only chunks carry no retrievable content and are dropped.
pub fn chunk_document(source_name: &str, text: &str, config: SplitterConfig) -> Vec<Chunk> {
    split_text(text, config)
        .into_iter()
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            id: chunk_id(source_name, &text),
            source_name: source_name.to_string(),
            sequence_index,
            text,
        })
        .collect()
}

fn split_by_ladder(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    let Some((separator, finer)) = separators.split_first() else {
        // No separator left: cut by raw length.
        let chars: Vec<char> = text.chars().collect();
        return chars
            .chunks(chunk_size)
            .map(|piece| piece.iter().collect())
            .collect();
    };

    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for piece in text.split_inclusive(*separator) {
        if piece.chars().count() <= chunk_size {
            pieces.push(piece.to_string());
        } else {
            pieces.extend(split_by_ladder(piece, chunk_size, finer));
        }
    }

    pieces
}

/// Greedily packs pieces into chunks of at most `chunk_size` characters.
/// When a chunk closes, the smallest trailing run of pieces covering at
/// least `overlap` characters is carried into the next chunk, unless doing
/// so would push the next chunk past `chunk_size`.
fn merge_with_overlap(pieces: Vec<String>, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<String> = Vec::new();
    let mut window_len = 0usize;

    for piece in pieces {
        let piece_len = piece.chars().count();

        if window_len > 0 && window_len + piece_len > chunk_size {
            chunks.push(window.concat());

            let mut kept: Vec<String> = Vec::new();
            let mut kept_len = 0usize;
            for previous in window.iter().rev() {
                if kept_len >= overlap {
                    break;
                }
                kept_len += previous.chars().count();
                kept.push(previous.clone());
            }
            kept.reverse();

            if kept_len + piece_len > chunk_size {
                kept.clear();
                kept_len = 0;
            }

            window = kept;
            window_len = kept_len;
        }

        window_len += piece_len;
        window.push(piece);
    }

    if !window.is_empty() {
        chunks.push(window.concat());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> SplitterConfig {
        SplitterConfig::new(chunk_size, overlap).expect("valid config")
    }

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(SplitterConfig::new(0, 0).is_err());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(SplitterConfig::new(4, 4).is_err());
        assert!(SplitterConfig::new(4, 9).is_err());
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_text("", config(10, 2)).is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk_without_overlap() {
        let chunks = split_text("short text", config(100, 40));
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn character_fallback_matches_sliding_window() {
        let chunks = split_text("ABCDEFGHIJ", config(4, 2));
        assert_eq!(chunks, vec!["ABCD", "CDEF", "EFGH", "GHIJ"]);
    }

    #[test]
    fn overlap_removal_reconstructs_original() {
        let original = "ABCDEFGHIJ";
        let chunks = split_text(original, config(4, 2));

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            let tail: String = chunk.chars().skip(2).collect();
            rebuilt.push_str(&tail);
        }
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn every_chunk_respects_the_length_bound() {
        let text = "First paragraph with some words.\n\nSecond paragraph. It keeps going with more words than fit.\nA line.\nAnother line that is fairly long for the limit chosen here.";
        for (chunk_size, overlap) in [(20, 5), (32, 10), (50, 0), (7, 3)] {
            for chunk in split_text(text, config(chunk_size, overlap)) {
                assert!(
                    chunk.chars().count() <= chunk_size,
                    "chunk {chunk:?} exceeds {chunk_size}"
                );
            }
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Invoice 15879/22.\n\nOrder date Apr 22, 2022. Payment terms NET 30.";
        let first = split_text(text, config(24, 8));
        let second = split_text(text, config(24, 8));
        assert_eq!(first, second);
    }

    #[test]
    fn paragraph_boundaries_are_preferred_over_raw_cuts() {
        let text = "alpha beta\n\ngamma delta";
        let chunks = split_text(text, config(12, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "alpha beta\n\n");
        assert_eq!(chunks[1], "gamma delta");
    }

    #[test]
    fn chunk_id_is_deterministic_and_content_sensitive() {
        let first = chunk_id("image_15.jpg", "alpha beta");
        let second = chunk_id("image_15.jpg", "alpha beta");
        let different = chunk_id("image_15.jpg", "gamma delta");

        assert_eq!(first, second);
        assert_ne!(first, different);
        assert!(first.starts_with("image_15.jpg-"));
        // sha256 hex digest after the source prefix
        assert_eq!(first.len(), "image_15.jpg-".len() + 64);
    }

    #[test]
    fn chunk_document_assigns_sequential_positions() {
        let chunks = chunk_document("doc1", "alpha beta\n\ngamma delta", config(12, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[1].sequence_index, 1);
        assert!(chunks.iter().all(|chunk| chunk.source_name == "doc1"));
        assert_ne!(chunks[0].id, chunks[1].id);
    }
}
