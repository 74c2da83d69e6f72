//! RAG pipeline. Ingest: normalize → redact → chunk → embed → store.
//! Answer: embed query → search → synthesize (or fall back).

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::chunks::{
    chunk_paragraphs, estimate_tokens, normalize, split_paragraphs, DEFAULT_MAX_TOKENS,
    DEFAULT_OVERLAP_TOKENS,
};
use crate::config::{Config, ConfigError};
use crate::extract::extract_text;
use crate::ollama::{OllamaClient, OllamaError};
use crate::outcome::Outcome;
use crate::redact::redact_pii;
use crate::retriever::{RetrieveError, Retriever};
use crate::service::{ServiceError, Synthesizer};
use crate::store::{StoreError, VectorIndex};
use crate::synth::{synthesize_answer, DEFAULT_CONTEXT_CHAR_BUDGET};

/// Contexts joined into the answer when the LLM is not used.
const NAIVE_ANSWER_CONTEXTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub context_char_budget: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            context_char_budget: DEFAULT_CONTEXT_CHAR_BUDGET,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_tokens: config.max_tokens,
            overlap_tokens: config.overlap_tokens,
            context_char_budget: config.context_char_budget,
        }
    }
}

/// Result of ingesting one text: chunks stored and their summed token estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub chunks: usize,
    pub tokens: usize,
}

/// Result of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks: usize,
    pub tokens: usize,
    /// Set when text extraction fell back to an empty result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// An answer with the ranked contexts and scores it was built from.
/// `contexts[i]` and `scores[i]` describe the i-th search slot; padding slots
/// have an empty context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Why a fallback answer was produced, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    pub contexts: Vec<String>,
    pub scores: Vec<f32>,
}

pub struct RagPipeline {
    retriever: Retriever,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        retriever: Retriever,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            options,
        }
    }

    /// Wires an Ollama-backed pipeline over the configured store directory.
    /// Synthesis is only enabled when `llm_model` is set.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let mut client =
            OllamaClient::from_url(&config.ollama_url)?.with_embed_model(config.embed_model.clone());
        if let Some(model) = config.llm_model.as_deref().filter(|m| !m.is_empty()) {
            client = client.with_llm_model(model);
        }
        let client = Arc::new(client);
        let index = VectorIndex::open(config.store_dir()?)?;
        let synthesizer: Option<Arc<dyn Synthesizer>> = if client.has_llm() {
            Some(client.clone() as Arc<dyn Synthesizer>)
        } else {
            None
        };
        Ok(Self::new(
            Retriever::new(index, client),
            synthesizer,
            PipelineOptions::from(config),
        ))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Chunks, embeds and stores `raw_text` under `doc_id`.
    /// Blank text (after optional redaction) stores nothing and returns zero stats.
    pub async fn ingest_text(
        &mut self,
        raw_text: &str,
        doc_id: &str,
        redact: bool,
    ) -> Result<IngestStats, PipelineError> {
        let mut text = normalize(raw_text);
        if redact {
            text = redact_pii(&text);
        }
        if text.trim().is_empty() {
            return Ok(IngestStats::default());
        }
        let paragraphs = split_paragraphs(&text);
        let chunks = chunk_paragraphs(
            &paragraphs,
            self.options.max_tokens,
            self.options.overlap_tokens,
        );
        if chunks.is_empty() {
            return Ok(IngestStats::default());
        }
        let stored = self.retriever.add_documents(&chunks, doc_id).await?;
        let tokens: usize = chunks.iter().map(|c| estimate_tokens(c)).sum();
        info!(doc_id, chunks = stored, tokens, "ingested document");
        Ok(IngestStats {
            chunks: stored,
            tokens,
        })
    }

    /// Extracts text from `path` (OCR where needed) and ingests it.
    /// `doc_id` defaults to `<file name>-<8 hex chars>`.
    pub async fn ingest_file(
        &mut self,
        path: &Path,
        doc_id: Option<&str>,
        lang: &str,
        redact: bool,
    ) -> Result<IngestReport, PipelineError> {
        let doc_id = doc_id.map_or_else(|| new_doc_id(path), str::to_string);
        let extraction = {
            let path = path.to_path_buf();
            let lang = lang.to_string();
            tokio::task::spawn_blocking(move || extract_text(&path, &lang))
                .await
                .unwrap_or_else(|e| Outcome::degraded(String::new(), e.to_string()))
        };
        let (text, warning) = extraction.into_parts();
        if let Some(reason) = &warning {
            warn!(path = %path.display(), reason = %reason, "ingesting empty extraction");
        }
        let stats = self.ingest_text(&text, &doc_id, redact).await?;
        Ok(IngestReport {
            doc_id,
            chunks: stats.chunks,
            tokens: stats.tokens,
            warning,
        })
    }

    /// Retrieves the top `k` chunks for `query` (re-reading the store first) and
    /// answers from them: via the synthesizer when `use_llm`, otherwise by joining
    /// the first few non-empty contexts.
    pub async fn answer(&mut self, query: &str, k: usize, use_llm: bool) -> Result<Answer, PipelineError> {
        let hits = self.retriever.query(query, k, true).await?;
        let contexts: Vec<String> = hits
            .iter()
            .map(|h| h.meta.as_ref().map(|m| m.text.clone()).unwrap_or_default())
            .collect();
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();

        let (answer, degraded) = if use_llm {
            synthesize_answer(
                self.synthesizer.as_deref(),
                query,
                &contexts,
                self.options.context_char_budget,
            )
            .await
            .into_parts()
        } else {
            let naive = contexts
                .iter()
                .filter(|c| !c.is_empty())
                .take(NAIVE_ANSWER_CONTEXTS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n\n");
            (naive, None)
        };
        info!(k, use_llm, fallback = degraded.is_some(), "answered query");
        Ok(Answer {
            answer,
            degraded,
            contexts,
            scores,
        })
    }
}

fn new_doc_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{name}-{}", &suffix[..8])
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("embedding error: {0}")]
    Embed(#[from] ServiceError),
    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("ollama setup: {0}")]
    Ollama(#[from] OllamaError),
}

impl From<RetrieveError> for PipelineError {
    fn from(e: RetrieveError) -> Self {
        match e {
            RetrieveError::Embed(e) => Self::Embed(e),
            RetrieveError::Store(e) => Self::Store(e),
        }
    }
}
