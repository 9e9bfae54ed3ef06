pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod ollama;
pub mod orchestrator;
pub mod prompt;
pub mod store;
pub mod traits;

pub use chunking::{chunk_document, chunk_id, split_text, SplitterConfig, SEPARATORS};
pub use embeddings::{HashingNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EngineError, Result};
pub use ingest::{
    build_document_fingerprint, digest_file, discover_image_files, IngestionReport, SkippedImage,
};
pub use models::{
    Chunk, ChunkMetadata, DocumentFingerprint, EmbeddingRecord, EngineOptions, QueryResult,
    ScoredRecord,
};
pub use ollama::{
    OllamaConfig, OllamaEmbedder, OllamaGenerator, OllamaVisionExtractor,
    DEFAULT_EXTRACTION_INSTRUCTIONS,
};
pub use orchestrator::{Answer, RagEngine, RetryPolicy};
pub use prompt::{
    PromptTemplate, CONTEXT_SEPARATOR, DEFAULT_SYSTEM_INSTRUCTIONS, DEFAULT_TEMPLATE,
};
pub use store::CollectionStore;
pub use traits::{Embedder, Generator, TextExtractor, VectorIndex};
