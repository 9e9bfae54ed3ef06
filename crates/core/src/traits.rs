use crate::error::Result;
use crate::models::{EmbeddingRecord, ScoredRecord};
use async_trait::async_trait;
use std::path::Path;

/// Turns a document image into text. Implementations own the extraction
/// instructions (table layout, size notation, and so on).
#[async_trait]
pub trait TextExtractor {
    async fn extract(&self, image_path: &Path) -> Result<String>;
}

/// Turns text into a fixed-dimensional vector. Dimensionality is fixed per
/// deployment; the index rejects mixed dimensions at upsert and search.
#[async_trait]
pub trait Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Turns an assembled prompt into an answer.
#[async_trait]
pub trait Generator {
    async fn generate(&self, prompt: &str, system_instructions: &str) -> Result<String>;
}

/// Persistent nearest-neighbor store over embedding records.
#[async_trait]
pub trait VectorIndex {
    /// Inserts the records, overwriting any existing record with the same
    /// id. Single-writer discipline is assumed by the caller.
    async fn upsert(&mut self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Returns at most `k` records ordered best-match-first. An empty index
    /// yields an empty result, not an error.
    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>>;
}
