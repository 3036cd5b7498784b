//! # ChatRelay Core
//!
//! Domain types, collaborator traits, and error definitions for ChatRelay.
//! This crate has **no framework dependencies**: it defines the model every
//! other crate implements against.
//!
//! Three collaborators sit behind traits here:
//! - [`Provider`]: the chat-completion model client
//! - [`ChatMemory`]: conversation-scoped turn storage
//! - [`VectorStore`]: top-K similarity search over documents
//!
//! Implementations live in `chatrelay-providers` and `chatrelay-memory`;
//! tests swap in fakes.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod token;
pub mod vector_store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use memory::ChatMemory;
pub use message::{ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use vector_store::{Document, SearchRequest, VectorStore};
