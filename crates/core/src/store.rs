use crate::error::{EngineError, Result};
use crate::models::{EmbeddingRecord, ScoredRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A named collection inside a persistence directory, stored as a single
/// JSON document at `<persist_dir>/<collection>.json`. Records keep their
/// insertion order, which makes equal-score search results stable.
pub struct CollectionStore {
    path: PathBuf,
    collection: String,
    records: Vec<EmbeddingRecord>,
    by_id: HashMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    collection: String,
    records: Vec<EmbeddingRecord>,
}

impl CollectionStore {
    /// Opens (or creates) the collection under `persist_dir`. Existing
    /// state is loaded eagerly so the store survives process restarts.
    pub fn open(persist_dir: &Path, collection: &str) -> Result<Self> {
        if collection.trim().is_empty() {
            return Err(EngineError::Config(
                "collection name must not be empty".to_string(),
            ));
        }

        fs::create_dir_all(persist_dir)?;
        let path = persist_dir.join(format!("{collection}.json"));

        let records = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let file: CollectionFile = serde_json::from_str(&raw)?;
            file.records
        } else {
            Vec::new()
        };

        let by_id = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id.clone(), position))
            .collect();

        debug!(
            collection = collection,
            records = records.len(),
            path = %path.display(),
            "collection opened"
        );

        Ok(Self {
            path,
            collection: collection.to_string(),
            records,
            by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|record| record.vector.len())
    }

    fn flush(&self) -> Result<()> {
        let file = CollectionFile {
            collection: self.collection.clone(),
            records: self.records.clone(),
        };
        let encoded = serde_json::to_vec(&file)?;

        // Write-then-rename so a crash mid-write never truncates the
        // collection file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for CollectionStore {
    async fn upsert(&mut self, records: &[EmbeddingRecord]) -> Result<()> {
        for record in records {
            if let Some(expected) = self.dimensions() {
                if record.vector.len() != expected {
                    return Err(EngineError::Embedding(format!(
                        "record {} has dimension {}, collection {} holds {expected}",
                        record.id,
                        record.vector.len(),
                        self.collection
                    )));
                }
            }

            match self.by_id.get(&record.id) {
                Some(&position) => self.records[position] = record.clone(),
                None => {
                    self.by_id.insert(record.id.clone(), self.records.len());
                    self.records.push(record.clone());
                }
            }
        }

        self.flush()
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Err(EngineError::Config(
                "search requires k greater than zero".to_string(),
            ));
        }

        if let Some(expected) = self.dimensions() {
            if query_vector.len() != expected {
                return Err(EngineError::Embedding(format!(
                    "query vector has dimension {}, collection {} holds {expected}",
                    query_vector.len(),
                    self.collection
                )));
            }
        }

        let mut hits: Vec<ScoredRecord> = self
            .records
            .iter()
            .map(|record| ScoredRecord {
                record: record.clone(),
                score: cosine_similarity(query_vector, &record.vector),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores.
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(k);
        Ok(hits)
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use tempfile::tempdir;

    fn record(id: &str, vector: Vec<f32>, text: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_name: "doc1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_instead_of_duplicating() -> Result<()> {
        let dir = tempdir()?;
        let mut store = CollectionStore::open(dir.path(), "image_texts")?;

        let batch = vec![
            record("doc1-a", vec![1.0, 0.0], "alpha beta"),
            record("doc1-b", vec![0.0, 1.0], "gamma delta"),
        ];
        store.upsert(&batch).await?;
        store.upsert(&batch).await?;

        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn records_survive_reopen() -> Result<()> {
        let dir = tempdir()?;
        {
            let mut store = CollectionStore::open(dir.path(), "image_texts")?;
            store
                .upsert(&[record("doc1-a", vec![1.0, 0.0], "alpha beta")])
                .await?;
        }

        let reopened = CollectionStore::open(dir.path(), "image_texts")?;
        assert_eq!(reopened.len(), 1);

        let hits = reopened.search(&[1.0, 0.0], 5).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.text, "alpha beta");
        assert_eq!(hits[0].record.metadata.source_name, "doc1");
        Ok(())
    }

    #[tokio::test]
    async fn search_orders_best_match_first() -> Result<()> {
        let dir = tempdir()?;
        let mut store = CollectionStore::open(dir.path(), "image_texts")?;
        store
            .upsert(&[
                record("a", vec![0.1, 1.0], "far"),
                record("b", vec![1.0, 0.05], "near"),
            ])
            .await?;

        let hits = store.search(&[1.0, 0.0], 2).await?;
        assert_eq!(hits[0].record.id, "b");
        assert_eq!(hits[1].record.id, "a");
        assert!(hits[0].score > hits[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() -> Result<()> {
        let dir = tempdir()?;
        let mut store = CollectionStore::open(dir.path(), "image_texts")?;
        store
            .upsert(&[
                record("first", vec![1.0, 0.0], "one"),
                record("second", vec![2.0, 0.0], "same direction, same cosine"),
            ])
            .await?;

        let hits = store.search(&[1.0, 0.0], 2).await?;
        assert_eq!(hits[0].record.id, "first");
        assert_eq!(hits[1].record.id, "second");
        Ok(())
    }

    #[tokio::test]
    async fn search_never_returns_more_than_available() -> Result<()> {
        let dir = tempdir()?;
        let mut store = CollectionStore::open(dir.path(), "image_texts")?;
        store
            .upsert(&[record("only", vec![1.0, 0.0], "single")])
            .await?;

        let hits = store.search(&[1.0, 0.0], 5).await?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_store_yields_empty_result() -> Result<()> {
        let dir = tempdir()?;
        let store = CollectionStore::open(dir.path(), "image_texts")?;
        let hits = store.search(&[1.0, 0.0], 3).await?;
        assert!(hits.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() -> Result<()> {
        let dir = tempdir()?;
        let mut store = CollectionStore::open(dir.path(), "image_texts")?;
        store
            .upsert(&[record("a", vec![1.0, 0.0], "two dims")])
            .await?;

        let upsert = store
            .upsert(&[record("b", vec![1.0, 0.0, 0.0], "three dims")])
            .await;
        assert!(matches!(upsert, Err(EngineError::Embedding(_))));

        let search = store.search(&[1.0, 0.0, 0.0], 1).await;
        assert!(matches!(search, Err(EngineError::Embedding(_))));
        Ok(())
    }
}
