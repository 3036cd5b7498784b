//! In-process vector store with JSON-lines persistence.
//!
//! Documents and their embeddings live in a `Vec` behind a lock; search is
//! a linear cosine scan. Embeddings come from the configured provider's
//! `embed` endpoint. When a path is set, `save()` writes one JSON document
//! per line and `load()` reads them back, skipping corrupted lines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chatrelay_core::error::RetrievalError;
use chatrelay_core::provider::{EmbeddingRequest, Provider};
use chatrelay_core::vector_store::{Document, SearchRequest, VectorStore};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::vector::rank_documents;

/// A linear-scan vector store.
pub struct SimpleVectorStore {
    provider: Arc<dyn Provider>,
    embedding_model: String,
    path: Option<PathBuf>,
    documents: RwLock<Vec<Document>>,
}

impl SimpleVectorStore {
    /// An empty, memory-only store.
    pub fn new(provider: Arc<dyn Provider>, embedding_model: impl Into<String>) -> Self {
        Self {
            provider,
            embedding_model: embedding_model.into(),
            path: None,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// A store backed by a JSONL file.
    ///
    /// A missing file yields an empty store; it is created on first `save()`.
    pub fn load(
        provider: Arc<dyn Provider>,
        embedding_model: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, RetrievalError> {
        let path = path.into();
        let documents = read_jsonl(&path)?;
        debug!(path = %path.display(), count = documents.len(), "Vector store loaded");
        Ok(Self {
            provider,
            embedding_model: embedding_model.into(),
            path: Some(path),
            documents: RwLock::new(documents),
        })
    }

    /// Where this store persists, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write every document to the backing file.
    pub async fn save(&self) -> Result<(), RetrievalError> {
        let Some(path) = &self.path else {
            return Err(RetrievalError::Storage(
                "store has no backing file".into(),
            ));
        };

        let documents = self.documents.read().await;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievalError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for doc in documents.iter() {
            let line = serde_json::to_string(doc).map_err(|e| {
                RetrievalError::Storage(format!("Failed to serialize document: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(path, &content)
            .map_err(|e| RetrievalError::Storage(format!("Failed to write store file: {e}")))?;

        debug!(path = %path.display(), count = documents.len(), "Vector store saved");
        Ok(())
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let expected = inputs.len();
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs,
            })
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<Document>, RetrievalError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(RetrievalError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Document>(line) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(error = %e, "Skipping corrupted document line");
                None
            }
        })
        .collect())
}

#[async_trait]
impl VectorStore for SimpleVectorStore {
    fn name(&self) -> &str {
        "simple"
    }

    async fn add(&self, mut documents: Vec<Document>) -> Result<Vec<String>, RetrievalError> {
        let missing: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let inputs = missing.iter().map(|&i| documents[i].text.clone()).collect();
            let embeddings = self.embed(inputs).await?;
            for (i, embedding) in missing.into_iter().zip(embeddings) {
                documents[i].embedding = Some(embedding);
            }
        }

        for doc in documents.iter_mut() {
            if doc.id.is_empty() {
                doc.id = Uuid::new_v4().to_string();
            }
            doc.score = 0.0;
        }

        let ids = documents.iter().map(|d| d.id.clone()).collect();
        self.documents.write().await.extend(documents);
        Ok(ids)
    }

    async fn similarity_search(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<Document>, RetrievalError> {
        if request.top_k == 0 || self.documents.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embed(vec![request.query.clone()])
            .await?
            .pop()
            .unwrap_or_default();

        let documents = self.documents.read().await;
        Ok(rank_documents(
            &documents,
            &query_embedding,
            request.top_k,
            request.similarity_threshold,
        ))
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, RetrievalError> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|d| !ids.contains(&d.id));
        Ok(before - documents.len())
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.documents.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::error::ProviderError;
    use chatrelay_core::message::Message;
    use chatrelay_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    /// Embeds text as counts of a few marker words.
    struct KeywordEmbedder;

    const VOCAB: [&str; 3] = ["rust", "python", "coffee"];

    #[async_trait]
    impl Provider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keywords"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(""),
                usage: None,
                model: request.model,
            })
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> Result<EmbeddingResponse, ProviderError> {
            let embeddings = request
                .inputs
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect()
                })
                .collect();
            Ok(EmbeddingResponse {
                embeddings,
                model: request.model,
                usage: None,
            })
        }
    }

    struct NoEmbeddings;

    #[async_trait]
    impl Provider for NoEmbeddings {
        fn name(&self) -> &str {
            "none"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("none".into()))
        }
    }

    fn store() -> SimpleVectorStore {
        SimpleVectorStore::new(Arc::new(KeywordEmbedder), "kw")
    }

    async fn seeded(store: &SimpleVectorStore) {
        store
            .add(vec![
                Document::new("Rust is a systems language. Rust has ownership."),
                Document::new("Python is dynamic."),
                Document::new("Coffee is brewed from beans."),
            ])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_assigns_ids_and_embeddings() {
        let store = store();
        let ids = store
            .add(vec![Document::new("rust"), Document { id: "fixed".into(), ..Document::new("coffee") }])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!ids[0].is_empty());
        assert_eq!(ids[1], "fixed");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_returns_best_first() {
        let store = store();
        seeded(&store).await;

        let results = store
            .similarity_search(SearchRequest::new("tell me about rust").with_top_k(2))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].text.starts_with("Rust"));
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn search_with_threshold_can_return_nothing() {
        let store = store();
        seeded(&store).await;

        let results = store
            .similarity_search(
                SearchRequest::new("quantum chromodynamics").with_similarity_threshold(0.1),
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_store_skips_embedding() {
        let store = SimpleVectorStore::new(Arc::new(NoEmbeddings), "none");
        let results = store.similarity_search(SearchRequest::new("anything")).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_is_retrieval_error() {
        let store = SimpleVectorStore::new(Arc::new(NoEmbeddings), "none");
        let err = store.add(vec![Document::new("text")]).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingFailed(_)));
    }

    #[tokio::test]
    async fn delete_removes_by_id() {
        let store = store();
        let ids = store
            .add(vec![Document::new("rust"), Document::new("python")])
            .await
            .unwrap();
        assert_eq!(store.delete(&ids[..1]).await.unwrap(), 1);
        assert_eq!(store.delete(&ids[..1]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("docs.jsonl");

        let store = SimpleVectorStore::load(Arc::new(KeywordEmbedder), "kw", &path).unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        seeded(&store).await;
        store.save().await.unwrap();

        let reloaded = SimpleVectorStore::load(Arc::new(KeywordEmbedder), "kw", &path).unwrap();
        assert_eq!(reloaded.count().await.unwrap(), 3);
        let results = reloaded
            .similarity_search(SearchRequest::new("coffee").with_top_k(1))
            .await
            .unwrap();
        assert!(results[0].text.contains("Coffee"));
    }

    #[tokio::test]
    async fn load_skips_corrupted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");
        let good = serde_json::to_string(&Document::new("kept")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json at all\n\n")).unwrap();

        let store = SimpleVectorStore::load(Arc::new(KeywordEmbedder), "kw", &path).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_without_path_fails() {
        let err = store().save().await.unwrap_err();
        assert!(matches!(err, RetrievalError::Storage(_)));
    }
}
