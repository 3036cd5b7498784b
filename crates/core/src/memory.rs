//! ChatMemory trait: conversation-scoped turn storage.
//!
//! The dispatcher never inspects turns itself. It asks the memory for the
//! turns recorded under a [`ConversationId`], replays them ahead of the new
//! user message, and appends the new user/assistant turns afterwards.
//! Window size, eviction and persistence belong to the implementation.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::{ConversationId, Message};

/// Keyed append/replay store for conversation turns.
///
/// Implementations: message-window (in process), none (no-op).
#[async_trait]
pub trait ChatMemory: Send + Sync {
    /// The backend name (e.g., "window", "none").
    fn name(&self) -> &str;

    /// Turns currently retained for `conversation_id`, oldest first.
    ///
    /// Unknown conversations yield an empty list.
    async fn get(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError>;

    /// Append turns to `conversation_id`, creating it if needed.
    async fn add(
        &self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
    ) -> Result<(), MemoryError>;

    /// Forget everything recorded for `conversation_id`.
    async fn clear(&self, conversation_id: &ConversationId) -> Result<(), MemoryError>;

    /// Number of conversations currently tracked.
    async fn conversation_count(&self) -> Result<usize, MemoryError>;
}
