//! All backend logic independent of how the app is run.
//!
//! Documents are extracted, normalized, chunked and embedded into a file-backed
//! vector index; queries are answered from the top-ranked chunks. docrag stores
//! config and the default index in its own app data directory (see [app_data]).

pub mod app_data;
pub mod chunks;
pub mod config;
pub mod docs;
pub mod extract;
pub mod fields;
pub mod ollama;
pub mod outcome;
pub mod pipeline;
pub mod redact;
pub mod retriever;
pub mod service;
pub mod store;
pub mod synth;

pub use app_data::{app_data_dir, default_store_dir};
pub use chunks::{chunk_paragraphs, estimate_tokens, normalize, split_paragraphs};
pub use config::{load_config, save_config, set_llm_model, set_store_dir, Config, ConfigError};
pub use docs::{scan_documents, ScanError};
pub use extract::{extract_text, ExtractError};
pub use fields::extract_fields;
pub use ollama::{OllamaClient, OllamaError};
pub use outcome::Outcome;
pub use pipeline::{Answer, IngestReport, IngestStats, PipelineError, PipelineOptions, RagPipeline};
pub use redact::redact_pii;
pub use retriever::{RetrieveError, Retriever};
pub use service::{Embedder, ServiceError, Synthesizer};
pub use store::{ChunkMeta, Hit, StoreError, VectorIndex, MAX_K, PADDING_SCORE};
pub use synth::synthesize_answer;

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "docrag-core ready"
}
