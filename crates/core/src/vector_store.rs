//! VectorStore trait: similarity search over embedded documents.
//!
//! Given a query string, a store returns the top-K documents whose embeddings
//! are closest to the query's embedding, best match first, each carrying its
//! similarity score.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A text snippet held by a vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique ID (assigned by the store when empty)
    #[serde(default)]
    pub id: String,

    /// The text content
    pub text: String,

    /// Free-form metadata (source file, chunk index, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Similarity score (set by search operations)
    #[serde(default)]
    pub score: f32,

    /// Embedding vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// A document with no id, metadata or embedding yet.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            text: text.into(),
            metadata: serde_json::Map::new(),
            score: 0.0,
            embedding: None,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The query text
    pub query: String,

    /// Maximum number of results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity score; lower-scoring documents are discarded
    #[serde(default)]
    pub similarity_threshold: f32,
}

fn default_top_k() -> usize {
    4
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            similarity_threshold: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

/// The core VectorStore trait.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The store name (e.g., "simple").
    fn name(&self) -> &str;

    /// Add documents, returning their ids in input order.
    async fn add(&self, documents: Vec<Document>) -> Result<Vec<String>, RetrievalError>;

    /// Top-K most similar documents for the request, best first.
    async fn similarity_search(&self, request: SearchRequest) -> Result<Vec<Document>, RetrievalError>;

    /// Delete documents by id, returning how many were removed.
    async fn delete(&self, ids: &[String]) -> Result<usize, RetrievalError>;

    /// Total number of stored documents.
    async fn count(&self) -> Result<usize, RetrievalError>;
}
