//! Conversation records and the per-user history store

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use log::debug;

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role
{   System
  , User
  , Assistant
}

/// One immutable conversation turn.
/// Ordering within a conversation is significant, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message
{   pub role: Role
  , pub content: String
}

impl Message
{   pub fn user(content: impl Into<String>) -> Self
    {   Message
        {   role: Role::User
          , content: content.into()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   Message
        {   role: Role::Assistant
          , content: content.into()
        }
    }
}

/// Per-user conversation persistence, keyed by user identifier.
/// Consumed by the relay; last-write-wins per user, no cross-request
/// locking.
pub trait ConversationStore
{   /// Full ordered history for a user, oldest first
    fn get_messages(&self, user_id: i64) -> Vec<Message>;

    /// Append a batch of turns to a user's history
    fn put_message_list(
      &mut self
    , user_id: i64
    , message_list: Vec<Message>
    );

    /// Remove all history for a user
    fn clear_messages(&mut self, user_id: i64);
}

/// In-memory store for tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryStore
{   conversations: HashMap<i64, Vec<Message>>
}

impl MemoryStore
{   pub fn new() -> Self
    {   MemoryStore
        {   conversations: HashMap::new()
        }
    }
}

impl ConversationStore for MemoryStore
{   fn get_messages(&self, user_id: i64) -> Vec<Message>
    {   self.conversations
          .get(&user_id)
          .cloned()
          .unwrap_or_default()
    }

    fn put_message_list(
      &mut self
    , user_id: i64
    , message_list: Vec<Message>
    )
    {   debug!(
          "Appending {} messages for user {}",
          message_list.len(),
          user_id
        );
        self.conversations
          .entry(user_id)
          .or_default()
          .extend(message_list);
    }

    fn clear_messages(&mut self, user_id: i64)
    {   debug!("Clearing history for user {}", user_id);
        self.conversations.remove(&user_id);
    }
}

/// Keep only the newest `window` messages.
/// Applied when assembling a prompt; stored history stays unbounded.
pub fn window(messages: Vec<Message>, window: usize)
  -> Vec<Message>
{   if messages.len() <= window
    {   return messages;
    }
    let skip = messages.len() - window;
    messages.into_iter().skip(skip).collect()
}
