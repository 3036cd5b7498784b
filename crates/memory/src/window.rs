//! Message-window conversation memory.
//!
//! Keeps the most recent `max_messages` turns of each conversation in
//! process. System turns sit outside the window and are never evicted.
//! When more than `max_conversations` conversations are tracked, the least
//! recently updated one is dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use chatrelay_core::error::MemoryError;
use chatrelay_core::memory::ChatMemory;
use chatrelay_core::message::{ConversationId, Message, Role};
use tokio::sync::RwLock;
use tracing::debug;

struct Conversation {
    /// Logical clock value of the last `add`
    updated: u64,
    messages: Vec<Message>,
}

struct State {
    clock: u64,
    conversations: HashMap<ConversationId, Conversation>,
}

/// In-process sliding window of turns per conversation.
pub struct WindowChatMemory {
    max_messages: usize,
    max_conversations: usize,
    state: RwLock<State>,
}

impl WindowChatMemory {
    pub fn new(max_messages: usize, max_conversations: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            max_conversations: max_conversations.max(1),
            state: RwLock::new(State {
                clock: 0,
                conversations: HashMap::new(),
            }),
        }
    }

    /// Drop the oldest non-system turns until the window fits.
    fn trim(&self, messages: &mut Vec<Message>) {
        let windowed = messages.iter().filter(|m| m.role != Role::System).count();
        let mut excess = windowed.saturating_sub(self.max_messages);
        if excess == 0 {
            return;
        }
        messages.retain(|m| {
            if excess > 0 && m.role != Role::System {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

impl Default for WindowChatMemory {
    fn default() -> Self {
        Self::new(20, 1000)
    }
}

#[async_trait]
impl ChatMemory for WindowChatMemory {
    fn name(&self) -> &str {
        "window"
    }

    async fn get(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .get(conversation_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }

    async fn add(
        &self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
    ) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        state.clock += 1;
        let now = state.clock;

        let conversation = state
            .conversations
            .entry(conversation_id.clone())
            .or_insert_with(|| Conversation {
                updated: now,
                messages: Vec::new(),
            });
        conversation.updated = now;
        conversation.messages.extend(messages);
        self.trim(&mut conversation.messages);

        while state.conversations.len() > self.max_conversations {
            let oldest = state
                .conversations
                .iter()
                .min_by_key(|(_, c)| c.updated)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!(conversation_id = %id, "Evicting least recently updated conversation");
                    state.conversations.remove(&id);
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn clear(&self, conversation_id: &ConversationId) -> Result<(), MemoryError> {
        self.state.write().await.conversations.remove(conversation_id);
        Ok(())
    }

    async fn conversation_count(&self) -> Result<usize, MemoryError> {
        Ok(self.state.read().await.conversations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let memory = WindowChatMemory::default();
        let turns = memory.get(&ConversationId::from("nope")).await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn replays_turns_in_order() {
        let memory = WindowChatMemory::default();
        let id = ConversationId::from("c1");
        memory
            .add(&id, vec![Message::user("Hi, I'm Ana"), Message::assistant("Hello Ana")])
            .await
            .unwrap();
        memory.add(&id, vec![Message::user("What's my name?")]).await.unwrap();

        let turns = memory.get(&id).await.unwrap();
        assert_eq!(contents(&turns), vec!["Hi, I'm Ana", "Hello Ana", "What's my name?"]);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let memory = WindowChatMemory::default();
        memory.add(&ConversationId::from("a"), vec![Message::user("one")]).await.unwrap();
        memory.add(&ConversationId::from("b"), vec![Message::user("two")]).await.unwrap();

        let a = memory.get(&ConversationId::from("a")).await.unwrap();
        assert_eq!(contents(&a), vec!["one"]);
        assert_eq!(memory.conversation_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn window_drops_oldest_turns() {
        let memory = WindowChatMemory::new(3, 10);
        let id = ConversationId::from("c1");
        for i in 0..5 {
            memory.add(&id, vec![Message::user(format!("m{i}"))]).await.unwrap();
        }
        let turns = memory.get(&id).await.unwrap();
        assert_eq!(contents(&turns), vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn system_turns_survive_the_window() {
        let memory = WindowChatMemory::new(2, 10);
        let id = ConversationId::from("c1");
        memory.add(&id, vec![Message::system("be brief")]).await.unwrap();
        for i in 0..4 {
            memory.add(&id, vec![Message::user(format!("m{i}"))]).await.unwrap();
        }
        let turns = memory.get(&id).await.unwrap();
        assert_eq!(contents(&turns), vec!["be brief", "m2", "m3"]);
    }

    #[tokio::test]
    async fn evicts_least_recently_updated_conversation() {
        let memory = WindowChatMemory::new(10, 2);
        let (a, b, c) = (
            ConversationId::from("a"),
            ConversationId::from("b"),
            ConversationId::from("c"),
        );
        memory.add(&a, vec![Message::user("a1")]).await.unwrap();
        memory.add(&b, vec![Message::user("b1")]).await.unwrap();
        // Touch `a` so that `b` becomes the oldest
        memory.add(&a, vec![Message::user("a2")]).await.unwrap();
        memory.add(&c, vec![Message::user("c1")]).await.unwrap();

        assert_eq!(memory.conversation_count().await.unwrap(), 2);
        assert!(memory.get(&b).await.unwrap().is_empty());
        assert_eq!(memory.get(&a).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_forgets_conversation() {
        let memory = WindowChatMemory::default();
        let id = ConversationId::from("c1");
        memory.add(&id, vec![Message::user("hi")]).await.unwrap();
        memory.clear(&id).await.unwrap();
        assert!(memory.get(&id).await.unwrap().is_empty());
        assert_eq!(memory.conversation_count().await.unwrap(), 0);
    }
}
