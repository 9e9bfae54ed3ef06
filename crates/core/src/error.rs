use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("extraction failed for {source_name}: {reason}")]
    Extraction { source_name: String, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("generation failed: {0}")]
    Generation(String),
}

impl EngineError {
    pub fn extraction(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source.into(),
            reason: reason.into(),
        }
    }

    /// Transient failures worth retrying at the orchestrator boundary.
    /// Configuration and storage problems never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Extraction { .. } | Self::Embedding(_) | Self::Generation(_)
        )
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
