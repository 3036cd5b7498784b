//! The request dispatcher.
//!
//! Three entry points, one per endpoint:
//! - [`ChatDispatcher::chat`]: blocking completion
//! - [`ChatDispatcher::stream_chat`]: streamed completion, memory-scoped
//!   when a conversation id is given
//! - [`ChatDispatcher::rag_stream_chat`]: top-K retrieval, template
//!   assembly, streamed completion
//!
//! Input is validated before any collaborator is touched.

use std::sync::Arc;

use chatrelay_config::AppConfig;
use chatrelay_core::error::{Error, RetrievalError};
use chatrelay_core::memory::ChatMemory;
use chatrelay_core::message::{ConversationId, Message};
use chatrelay_core::provider::{Provider, ProviderRequest};
use chatrelay_core::token::estimate_messages_tokens;
use chatrelay_core::vector_store::{SearchRequest, VectorStore};
use tracing::{debug, info};

use crate::prompt::{PromptTemplate, fit_context};
use crate::stream::{AnswerSink, ChatStream, relay};

/// Immutable knobs for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Documents retrieved per RAG request
    pub top_k: usize,
    pub similarity_threshold: f32,
    /// Token budget for retrieved context (0 = unlimited)
    pub max_context_tokens: usize,
    /// Capacity of the fragment channel behind a `ChatStream`
    pub stream_buffer: usize,
    pub template: PromptTemplate,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: None,
            top_k: 3,
            similarity_threshold: 0.0,
            max_context_tokens: 3000,
            stream_buffer: 16,
            template: PromptTemplate::default(),
        }
    }
}

impl DispatcherSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let template = match &config.rag.template {
            Some(text) => PromptTemplate::new(text.clone())?,
            None => PromptTemplate::default(),
        };

        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        Ok(Self {
            model,
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            top_k: config.rag.top_k,
            similarity_threshold: config.rag.similarity_threshold,
            max_context_tokens: config.rag.max_context_tokens,
            stream_buffer: config.gateway.stream_buffer,
            template,
        })
    }
}

/// Routes a user input to the model, with optional memory or retrieval.
pub struct ChatDispatcher {
    provider: Arc<dyn Provider>,
    memory: Option<Arc<dyn ChatMemory>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    settings: DispatcherSettings,
}

impl ChatDispatcher {
    pub fn new(provider: Arc<dyn Provider>, settings: DispatcherSettings) -> Self {
        Self {
            provider,
            memory: None,
            vector_store: None,
            settings,
        }
    }

    /// Attach conversation memory used when a request carries an id.
    pub fn with_memory(mut self, memory: Arc<dyn ChatMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach the store searched by `rag_stream_chat`.
    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Blocking completion of `input`.
    pub async fn chat(
        &self,
        input: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<String, Error> {
        validate_input(input)?;

        let (messages, memory) = self.prepare_turns(input, conversation_id).await?;
        let request = self.request(messages, false);
        debug!(model = %request.model, turns = request.messages.len(), "Calling provider");

        let response = self.provider.complete(request).await?;
        let answer = response.message.content;

        if let Some((memory, id)) = memory {
            memory.add(id, vec![Message::assistant(answer.clone())]).await?;
        }

        info!(answer_len = answer.len(), "Chat completed");
        Ok(answer)
    }

    /// Streamed completion of `input`, replaying the conversation's prior
    /// turns when `conversation_id` is given.
    pub async fn stream_chat(
        &self,
        input: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<ChatStream, Error> {
        validate_input(input)?;

        let (messages, memory) = self.prepare_turns(input, conversation_id).await?;
        let request = self.request(messages, true);
        debug!(model = %request.model, turns = request.messages.len(), "Opening provider stream");

        let upstream = self.provider.stream(request).await?;
        let sink = memory.map(|(memory, id)| AnswerSink {
            memory,
            conversation_id: id.clone(),
        });
        Ok(relay(upstream, self.settings.stream_buffer, sink))
    }

    /// Retrieval-augmented streamed completion of `input`.
    ///
    /// Fails with a retrieval error before any fragment is produced when the
    /// store cannot be searched. An empty result set still calls the model,
    /// with an empty context.
    pub async fn rag_stream_chat(&self, input: &str) -> Result<ChatStream, Error> {
        validate_input(input)?;

        let store = self.vector_store.as_ref().ok_or_else(|| {
            RetrievalError::Unavailable("no vector store configured".into())
        })?;

        let documents = store
            .similarity_search(
                SearchRequest::new(input)
                    .with_top_k(self.settings.top_k)
                    .with_similarity_threshold(self.settings.similarity_threshold),
            )
            .await?;
        debug!(documents = documents.len(), store = store.name(), "Documents retrieved");

        let context = fit_context(&documents, self.settings.max_context_tokens);
        let prompt = self.settings.template.render(&context, input);
        debug!(prompt = %prompt, "Assembled retrieval prompt");

        let request = self.request(vec![Message::user(prompt)], true);
        let upstream = self.provider.stream(request).await?;
        Ok(relay(upstream, self.settings.stream_buffer, None))
    }

    /// Build the outgoing turns and, for memory-scoped calls, record the new
    /// user turn.
    async fn prepare_turns<'a>(
        &self,
        input: &str,
        conversation_id: Option<&'a ConversationId>,
    ) -> Result<(Vec<Message>, Option<(Arc<dyn ChatMemory>, &'a ConversationId)>), Error> {
        let user = Message::user(input);

        let (Some(id), Some(memory)) = (conversation_id, &self.memory) else {
            return Ok((vec![user], None));
        };

        let mut messages = memory.get(id).await?;
        debug!(
            conversation_id = %id,
            prior_turns = messages.len(),
            prior_tokens = estimate_messages_tokens(&messages),
            "Replaying conversation"
        );
        memory.add(id, vec![user.clone()]).await?;
        messages.push(user);

        Ok((messages, Some((Arc::clone(memory), id))))
    }

    fn request(&self, messages: Vec<Message>, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream,
        }
    }
}

fn validate_input(input: &str) -> Result<(), Error> {
    if input.trim().is_empty() {
        return Err(Error::Validation("input must not be empty".into()));
    }
    Ok(())
}
