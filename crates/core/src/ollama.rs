use crate::error::{EngineError, Result};
use crate::traits::{Embedder, Generator, TextExtractor};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Instructions handed to the vision model for each image. Invoices carry
/// tables whose empty cells and size-wise billing columns (S, M, L, XL)
/// must come through verbatim, otherwise retrieval answers shift columns.
pub const DEFAULT_EXTRACTION_INSTRUCTIONS: &str = "\
This is a real invoice for some purchase. Extract the content of the given \
image. The invoice will have tables; extract them as they are, including \
all columns and values. Preserve empty cells and empty columns, do not \
remove or adjust them. Size-wise billing such as S, M, L, XL must be \
preserved exactly as printed.";

/// Explicit provider configuration, passed into each adapter's
/// constructor. Nothing here is process-global.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub vision_model: String,
    pub request_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            generation_model: "llama3.2".to_string(),
            vision_model: "llama3.2-vision".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

fn build_client(config: &OllamaConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|error| EngineError::Config(format!("http client: {error}")))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Extracts text from a document image with a multimodal model via the
/// Ollama chat endpoint.
pub struct OllamaVisionExtractor {
    client: Client,
    base_url: String,
    model: String,
    instructions: String,
}

impl OllamaVisionExtractor {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.clone(),
            model: config.vision_model.clone(),
            instructions: DEFAULT_EXTRACTION_INSTRUCTIONS.to_string(),
        })
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }
}

#[async_trait]
impl TextExtractor for OllamaVisionExtractor {
    async fn extract(&self, image_path: &Path) -> Result<String> {
        let source = image_path.display().to_string();
        let bytes = std::fs::read(image_path)
            .map_err(|error| EngineError::extraction(source.as_str(), error.to_string()))?;

        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: self.instructions.clone(),
                images: vec![STANDARD.encode(bytes)],
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|error| EngineError::extraction(source.as_str(), error.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::extraction(
                source.as_str(),
                format!("vision endpoint returned {}", response.status()),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| EngineError::extraction(source.as_str(), error.to_string()))?;

        chat_content(parsed)
            .ok_or_else(|| EngineError::extraction(source.as_str(), "extraction returned no text"))
    }
}

fn chat_content(payload: ChatResponse) -> Option<String> {
    let content = payload.message?.content?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Embeds text via the Ollama embeddings endpoint.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = EmbeddingsRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|error| EngineError::Embedding(error.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Embedding(format!(
                "embeddings endpoint returned {}",
                response.status()
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|error| EngineError::Embedding(error.to_string()))?;

        embedding_vector(parsed, &self.model)
    }
}

fn embedding_vector(payload: EmbeddingsResponse, model: &str) -> Result<Vec<f32>> {
    match payload.embedding {
        Some(vector) if !vector.is_empty() => Ok(vector),
        _ => Err(EngineError::Embedding(format!(
            "model {model} returned an empty embedding"
        ))),
    }
}

/// Generates the final answer via the Ollama generate endpoint.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.clone(),
            model: config.generation_model.clone(),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, system_instructions: &str) -> Result<String> {
        let payload = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: system_instructions.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|error| EngineError::Generation(error.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Generation(format!(
                "generate endpoint returned {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|error| EngineError::Generation(error.to_string()))?;

        match parsed.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(EngineError::Generation(format!(
                "model {} returned an empty answer",
                self.model
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_content_rejects_blank_payloads() {
        let empty: ChatResponse = serde_json::from_str(r#"{"message":{"content":"  "}}"#).unwrap();
        assert!(chat_content(empty).is_none());

        let missing: ChatResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(chat_content(missing).is_none());
    }

    #[test]
    fn chat_content_trims_extracted_text() {
        let payload: ChatResponse =
            serde_json::from_str(r#"{"message":{"content":"\nPURCHASE ORDER # 15879/22\n"}}"#)
                .unwrap();
        assert_eq!(
            chat_content(payload).as_deref(),
            Some("PURCHASE ORDER # 15879/22")
        );
    }

    #[test]
    fn embedding_vector_rejects_empty_embeddings() {
        let empty: EmbeddingsResponse = serde_json::from_str(r#"{"embedding":[]}"#).unwrap();
        assert!(matches!(
            embedding_vector(empty, "nomic-embed-text"),
            Err(EngineError::Embedding(_))
        ));

        let missing: EmbeddingsResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(embedding_vector(missing, "nomic-embed-text").is_err());
    }

    #[test]
    fn embedding_vector_accepts_nonempty_payloads() {
        let payload: EmbeddingsResponse =
            serde_json::from_str(r#"{"embedding":[0.5,-0.25,0.125]}"#).unwrap();
        let vector = embedding_vector(payload, "nomic-embed-text").unwrap();
        assert_eq!(vector, vec![0.5, -0.25, 0.125]);
    }
}
