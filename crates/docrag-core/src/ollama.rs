//! Ollama client for embeddings and answer synthesis. Wraps ollama-rs with a simple API.

use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;

use crate::service::{Embedder, ServiceError, Synthesizer};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    llm_model: Option<String>,
}

impl OllamaClient {
    /// Create from URL string, e.g. http://localhost:11434.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            llm_model: None,
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the completion model used for answer synthesis (e.g. `llama3.2`).
    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    pub fn has_llm(&self) -> bool {
        self.llm_model.is_some()
    }

    /// Embed multiple strings in one call. Returns one embedding per input.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OllamaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.embeddings)
    }

    /// Run one completion with the configured LLM model.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, OllamaError> {
        let model = self.llm_model.clone().ok_or(OllamaError::NoLlmModel)?;
        let req = GenerationRequest::new(model, prompt.to_string()).system(system.to_string());
        let res = self.inner.generate(req).await.map_err(OllamaError::Request)?;
        Ok(res.response.trim().to_string())
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_name(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.embed_batch(texts).await.map_err(ServiceError::from)
    }
}

#[async_trait]
impl Synthesizer for OllamaClient {
    fn model_name(&self) -> &str {
        self.llm_model.as_deref().unwrap_or("")
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        self.generate(system, prompt).await.map_err(ServiceError::from)
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
    #[error("no LLM model configured")]
    NoLlmModel,
}

impl From<OllamaError> for ServiceError {
    fn from(e: OllamaError) -> Self {
        match e {
            OllamaError::NoLlmModel => ServiceError::NotConfigured(e.to_string()),
            other => ServiceError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_url_is_rejected() {
        assert!(matches!(OllamaClient::from_url("not a url"), Err(OllamaError::ParseUrl(_))));
    }

    #[test]
    fn llm_model_is_optional() {
        let client = OllamaClient::from_url(DEFAULT_BASE_URL).unwrap();
        assert!(!client.has_llm());
        assert_eq!(Embedder::model_name(&client), DEFAULT_EMBED_MODEL);
        let client = client.with_llm_model("llama3.2");
        assert!(client.has_llm());
        assert_eq!(Synthesizer::model_name(&client), "llama3.2");
    }

    #[tokio::test]
    async fn generate_without_model_is_not_configured() {
        let client = OllamaClient::from_url(DEFAULT_BASE_URL).unwrap();
        let err = client.complete("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }
}
