//! Memory and retrieval implementations for ChatRelay.
//!
//! - [`WindowChatMemory`] / [`NoopChatMemory`] back the `ChatMemory` trait
//! - [`SimpleVectorStore`] backs the `VectorStore` trait
//! - [`TextSplitter`] cuts source files into chunks for ingestion

pub mod noop;
pub mod simple_store;
pub mod splitter;
pub mod vector;
pub mod window;

use std::sync::Arc;

use chatrelay_config::MemoryConfig;
use chatrelay_core::memory::ChatMemory;

pub use noop::NoopChatMemory;
pub use simple_store::SimpleVectorStore;
pub use splitter::TextSplitter;
pub use vector::{cosine_similarity, rank_documents};
pub use window::WindowChatMemory;

/// Build the conversation memory selected by `memory.backend`.
///
/// Unknown backends are rejected by config validation, so anything other
/// than `"none"` is treated as the message window.
pub fn build_chat_memory(config: &MemoryConfig) -> Arc<dyn ChatMemory> {
    match config.backend.as_str() {
        "none" => Arc::new(NoopChatMemory),
        _ => Arc::new(WindowChatMemory::new(
            config.max_messages,
            config.max_conversations,
        )),
    }
}
