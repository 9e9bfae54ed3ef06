use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted source document, fingerprinted for the ingestion report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub source_name: String,
    pub source_path: String,
    pub checksum: String,
    pub extracted_at: DateTime<Utc>,
}

/// A bounded substring of a document's text, the unit of embedding and
/// retrieval. Consecutive chunks from the same document may overlap in
/// content but never in `sequence_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_name: String,
    pub sequence_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_name: String,
}

/// Persisted record shape. The `{id, vector, text, metadata: {source_name}}`
/// layout is the on-disk contract and must survive reads and writes intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: EmbeddingRecord,
    pub score: f32,
}

/// Retrieval output, best-first. Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub query: String,
    pub hits: Vec<ScoredRecord>,
}

impl QueryResult {
    pub fn context_texts(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.record.text.as_str()).collect()
    }

    pub fn sources(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.record.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 400,
            top_k: 5,
        }
    }
}
