//! Shared test doubles for dispatcher and stream tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chatrelay_core::error::{MemoryError, ProviderError, RetrievalError};
use chatrelay_core::memory::ChatMemory;
use chatrelay_core::message::{ConversationId, Message};
use chatrelay_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use chatrelay_core::vector_store::{Document, SearchRequest, VectorStore};

/// A provider that answers every call with the same scripted text and
/// records the requests it received.
///
/// `stream` splits the answer into the given fragments.
pub struct ScriptedProvider {
    fragments: Vec<String>,
    fail_complete: Option<ProviderError>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            fail_complete: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            fail_complete: Some(error),
            ..Self::new(&[])
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record(&self, request: ProviderRequest) -> Result<(), ProviderError> {
        self.requests.lock().unwrap().push(request);
        match &self.fail_complete {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.record(request)?;
        Ok(ProviderResponse {
            message: Message::assistant(self.fragments.concat()),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.record(request)?;
        let (tx, rx) = tokio::sync::mpsc::channel(self.fragments.len() + 1);
        for fragment in &self.fragments {
            let _ = tx.send(Ok(StreamChunk::text(fragment.clone()))).await;
        }
        let _ = tx.send(Ok(StreamChunk::finished(None))).await;
        Ok(rx)
    }
}

/// A vector store returning fixed documents and recording queries.
pub struct FixedVectorStore {
    documents: Vec<Document>,
    fail: bool,
    requests: Mutex<Vec<SearchRequest>>,
}

impl FixedVectorStore {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            documents: texts.iter().map(|t| Document::new(*t)).collect(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for FixedVectorStore {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn add(&self, _documents: Vec<Document>) -> Result<Vec<String>, RetrievalError> {
        Ok(Vec::new())
    }

    async fn similarity_search(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<Document>, RetrievalError> {
        let top_k = request.top_k;
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(RetrievalError::Unavailable("index offline".into()));
        }
        Ok(self.documents.iter().take(top_k).cloned().collect())
    }

    async fn delete(&self, _ids: &[String]) -> Result<usize, RetrievalError> {
        Ok(0)
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.documents.len())
    }
}

/// Unbounded map-backed memory.
#[derive(Default)]
pub struct RecordingMemory {
    turns: Mutex<HashMap<ConversationId, Vec<Message>>>,
}

#[async_trait]
impl ChatMemory for RecordingMemory {
    fn name(&self) -> &str {
        "recording"
    }

    async fn get(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        Ok(self
            .turns
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add(
        &self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
    ) -> Result<(), MemoryError> {
        self.turns
            .lock()
            .unwrap()
            .entry(conversation_id.clone())
            .or_default()
            .extend(messages);
        Ok(())
    }

    async fn clear(&self, conversation_id: &ConversationId) -> Result<(), MemoryError> {
        self.turns.lock().unwrap().remove(conversation_id);
        Ok(())
    }

    async fn conversation_count(&self) -> Result<usize, MemoryError> {
        Ok(self.turns.lock().unwrap().len())
    }
}
