use crate::chunking::{chunk_document, SplitterConfig};
use crate::error::{EngineError, Result};
use crate::ingest::{build_document_fingerprint, discover_image_files, IngestionReport, SkippedImage};
use crate::models::{ChunkMetadata, EmbeddingRecord, EngineOptions, QueryResult};
use crate::prompt::{PromptTemplate, DEFAULT_SYSTEM_INSTRUCTIONS};
use crate::traits::{Embedder, Generator, TextExtractor, VectorIndex};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Bounded retry with exponential backoff for the external extract, embed,
/// and generate calls. Configuration and storage failures are returned
/// immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

async fn call_with_retries<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut delay = policy.base_delay;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < attempts => {
                warn!(%error, attempt, "{label} failed, retrying");
                sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(error) => return Err(error),
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

/// Wires the ingestion path (extract → split → identify → embed → upsert)
/// and the query path (embed → search → assemble → generate). Holds the
/// external capabilities and the index for the duration of one run; no
/// process-global state.
pub struct RagEngine<X, E, G, S>
where
    X: TextExtractor,
    E: Embedder,
    G: Generator,
    S: VectorIndex,
{
    extractor: X,
    embedder: E,
    generator: G,
    index: S,
    splitter: SplitterConfig,
    options: EngineOptions,
    template: PromptTemplate,
    system_instructions: String,
    retry: RetryPolicy,
}

impl<X, E, G, S> RagEngine<X, E, G, S>
where
    X: TextExtractor + Send + Sync,
    E: Embedder + Send + Sync,
    G: Generator + Send + Sync,
    S: VectorIndex + Send + Sync,
{
    /// Fails fast with a ConfigError when the chunking parameters are
    /// invalid, before any external call is made.
    pub fn new(
        extractor: X,
        embedder: E,
        generator: G,
        index: S,
        options: EngineOptions,
        template: PromptTemplate,
    ) -> Result<Self> {
        let splitter = SplitterConfig::try_from(options)?;
        if options.top_k == 0 {
            return Err(EngineError::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            extractor,
            embedder,
            generator,
            index,
            splitter,
            options,
            template,
            system_instructions: DEFAULT_SYSTEM_INSTRUCTIONS.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    /// Splits, identifies, embeds, and upserts one document's text.
    /// Returns the number of chunks written. Embedding and storage
    /// failures abort the operation; identical re-ingestion overwrites.
    pub async fn ingest_text(&mut self, source_name: &str, text: &str) -> Result<usize> {
        let chunks = chunk_document(source_name, text, self.splitter);
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = call_with_retries(self.retry, "embedding", || {
                self.embedder.embed(&chunk.text)
            })
            .await
            .map_err(|error| match error {
                EngineError::Embedding(reason) => EngineError::Embedding(format!(
                    "chunk {} of {source_name}: {reason}",
                    chunk.sequence_index
                )),
                other => other,
            })?;

            records.push(EmbeddingRecord {
                id: chunk.id.clone(),
                vector,
                text: chunk.text.clone(),
                metadata: ChunkMetadata {
                    source_name: chunk.source_name.clone(),
                },
            });
        }

        self.index.upsert(&records).await?;
        info!(source = source_name, chunks = records.len(), "document ingested");
        Ok(records.len())
    }

    /// Ingests every image found under `folder`. A failed extraction skips
    /// that image and is recorded in the report; the batch continues.
    pub async fn ingest_folder(&mut self, folder: &Path) -> Result<IngestionReport> {
        let files = discover_image_files(folder);
        if files.is_empty() {
            return Err(EngineError::extraction(
                folder.display().to_string(),
                "no image files found",
            ));
        }

        let mut report = IngestionReport::default();

        for path in files {
            let extracted = call_with_retries(self.retry, "extraction", || {
                self.extractor.extract(&path)
            })
            .await;

            let text = match extracted {
                Ok(text) => text,
                Err(EngineError::Extraction { reason, .. }) => {
                    warn!(path = %path.display(), reason = %reason, "skipped image");
                    report.skipped.push(SkippedImage { path, reason });
                    continue;
                }
                Err(other) => return Err(other),
            };

            let fingerprint = match build_document_fingerprint(&path) {
                Ok(fingerprint) => fingerprint,
                Err(error) => {
                    let reason = error.to_string();
                    warn!(path = %path.display(), reason = %reason, "skipped image");
                    report.skipped.push(SkippedImage { path, reason });
                    continue;
                }
            };

            report.chunk_count += self.ingest_text(&fingerprint.source_name, &text).await?;
            report.documents.push(fingerprint);
        }

        Ok(report)
    }

    /// Embeds the question and returns the `k` nearest chunks, best-first.
    /// Read-only with respect to the index.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<QueryResult> {
        if question.trim().is_empty() {
            return Err(EngineError::Config("query is empty".to_string()));
        }

        let query_vector =
            call_with_retries(self.retry, "query embedding", || self.embedder.embed(question))
                .await
                .map_err(|error| match error {
                    EngineError::Embedding(reason) => {
                        EngineError::Embedding(format!("query {question:?}: {reason}"))
                    }
                    other => other,
                })?;

        let hits = self.index.search(&query_vector, k).await?;
        Ok(QueryResult {
            query: question.to_string(),
            hits,
        })
    }

    pub fn assemble_prompt(&self, retrieved: &QueryResult, question: &str) -> String {
        self.template.render(&retrieved.context_texts(), question)
    }

    /// Produces the final answer for already-retrieved context. Kept
    /// separate from `retrieve` so callers still hold the context when
    /// generation fails and can fall back to it.
    pub async fn generate_answer(&self, retrieved: &QueryResult, question: &str) -> Result<String> {
        let prompt = self.assemble_prompt(retrieved, question);
        call_with_retries(self.retry, "generation", || {
            self.generator.generate(&prompt, &self.system_instructions)
        })
        .await
    }

    /// Retrieval and generation in one step, using the configured `top_k`.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let retrieved = self.retrieve(question, self.options.top_k).await?;
        let text = self.generate_answer(&retrieved, question).await?;
        Ok(Answer {
            text,
            sources: retrieved
                .sources()
                .into_iter()
                .map(str::to_string)
                .collect(),
            context: retrieved,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub context: QueryResult,
}
