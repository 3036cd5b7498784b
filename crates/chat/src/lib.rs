//! Request dispatching for ChatRelay.
//!
//! [`ChatDispatcher`] turns a user input into a model call: directly, with
//! conversation memory replayed ahead of it, or wrapped in a retrieval
//! prompt built from the vector store. Streaming results come back as a
//! [`ChatStream`] of text fragments.

pub mod dispatcher;
pub mod prompt;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{ChatDispatcher, DispatcherSettings};
pub use prompt::{PromptTemplate, RAG_TEMPLATE, assemble, fit_context, join_documents};
pub use stream::ChatStream;
