//! Embeds documents and queries and talks to the [VectorIndex].

use std::sync::Arc;

use tracing::debug;

use crate::service::{Embedder, ServiceError};
use crate::store::{ChunkMeta, Hit, StoreError, VectorIndex};

/// Owns the vector index and the embedding service handle.
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embeds `texts` in one batch and stores them under `doc_id`. Returns how many were stored.
    pub async fn add_documents(&mut self, texts: &[String], doc_id: &str) -> Result<usize, RetrieveError> {
        if texts.is_empty() {
            return Ok(0);
        }
        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(ServiceError::InvalidResponse(format!(
                "{} embeddings for {} texts",
                vectors.len(),
                texts.len()
            ))
            .into());
        }
        let metas: Vec<ChunkMeta> = texts
            .iter()
            .map(|t| ChunkMeta {
                doc_id: doc_id.to_string(),
                text: t.clone(),
            })
            .collect();
        self.index.add(&vectors, &metas)?;
        Ok(texts.len())
    }

    /// Top-`k` hits for `query`. With `force_reload` (or when nothing is loaded yet)
    /// the index is re-read from disk first, at the query's embedding dimension.
    pub async fn query(&mut self, query: &str, k: usize, force_reload: bool) -> Result<Vec<Hit>, RetrieveError> {
        let q = self.embedder.embed_one(query).await?;
        if force_reload || !self.index.is_loaded() {
            self.index.load(q.len())?;
        }
        let hits = self.index.search(&q, k)?;
        debug!(k, stored = self.index.len(), "searched vector index");
        Ok(hits)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("embedding error: {0}")]
    Embed(#[from] ServiceError),
    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    /// Embeds "east"/"north" style words onto fixed axes.
    struct Compass;

    #[async_trait]
    impl Embedder for Compass {
        fn model_name(&self) -> &str {
            "compass"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    "east" => vec![1.0, 0.0],
                    "north" => vec![0.0, 1.0],
                    _ => vec![1.0, 1.0],
                })
                .collect())
        }
    }

    struct Short;

    #[async_trait]
    impl Embedder for Short {
        fn model_name(&self) -> &str {
            "short"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(vec![vec![1.0]])
        }
    }

    fn retriever(dir: &std::path::Path) -> Retriever {
        Retriever::new(VectorIndex::open(dir).unwrap(), Arc::new(Compass))
    }

    #[tokio::test]
    async fn stale_reader_refreshes_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = retriever(dir.path());
        let mut reader = retriever(dir.path());

        writer.add_documents(&["east".to_string()], "a").await.unwrap();
        let hits = reader.query("north", 1, false).await.unwrap();
        assert_eq!(hits[0].meta.as_ref().unwrap().text, "east");

        writer.add_documents(&["north".to_string()], "b").await.unwrap();
        let stale = reader.query("north", 1, false).await.unwrap();
        assert_eq!(stale[0].meta.as_ref().unwrap().text, "east");
        let fresh = reader.query("north", 1, true).await.unwrap();
        assert_eq!(fresh[0].meta.as_ref().unwrap().text, "north");
        assert_eq!(fresh[0].meta.as_ref().unwrap().doc_id, "b");
    }

    #[tokio::test]
    async fn embedding_count_must_match_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = Retriever::new(VectorIndex::open(dir.path()).unwrap(), Arc::new(Short));
        let err = r
            .add_documents(&["a".to_string(), "b".to_string()], "d")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::Embed(ServiceError::InvalidResponse(_))));
        assert!(r.index().is_empty());
    }
}
