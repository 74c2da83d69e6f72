//! Interfaces to the external services the pipeline depends on.
//!
//! Services are passed in explicitly (see [crate::Retriever] and [crate::RagPipeline]),
//! so tests can swap in fakes.

use async_trait::async_trait;

/// Maps texts to fixed-dimension vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    /// Embed a single query string.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidResponse("empty embedding result".to_string()))
    }
}

/// Generates a completion for a prompt under a system instruction.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service not configured: {0}")]
    NotConfigured(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid service response: {0}")]
    InvalidResponse(String),
}
