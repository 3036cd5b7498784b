//! No-op conversation memory: `memory.backend = "none"`.

use async_trait::async_trait;
use chatrelay_core::error::MemoryError;
use chatrelay_core::memory::ChatMemory;
use chatrelay_core::message::{ConversationId, Message};

/// Remembers nothing; every conversation starts empty.
pub struct NoopChatMemory;

#[async_trait]
impl ChatMemory for NoopChatMemory {
    fn name(&self) -> &str {
        "none"
    }

    async fn get(&self, _conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        Ok(Vec::new())
    }

    async fn add(
        &self,
        _conversation_id: &ConversationId,
        _messages: Vec<Message>,
    ) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn clear(&self, _conversation_id: &ConversationId) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn conversation_count(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }
}
