pub mod error;
pub mod config;
pub mod prompt;
pub mod store;
pub mod providers;
pub mod relay;

/*

clovarelay (CLOVA relay): async-only library that sits between a chat
platform and the CLOVA Studio completion API. the platform glue feeds
user messages in, we keep per-user history, flatten it into the
question/answer prompt convention the LK-D2 endpoint expects, and hand
the extracted answer back.

clovarelay/
├── Cargo.toml          # Main manifest
├── src/
│   ├── lib.rs          # Re-exports and channel plumbing types
│   ├── error.rs        # Custom error types and handling
│   ├── config.rs       # Endpoint credentials and relay knobs
│   ├── prompt.rs       # Flattening, markers, answer extraction
│   ├── store.rs        # Conversation records and history store
│   ├── providers/      # Completion endpoint clients
│   │   ├── mod.rs      # Re-exports
│   │   └── clova.rs    # CLOVA Studio client
│   └── relay.rs        # Relay backend driving store + client
└── tests/              # Integration and unit tests

*/

/// RELAY API INTERFACE:

// ===== Completion =====

pub type CompletionReply
  = Result<crate::store::Message, crate::error::Error>;
pub type CompletionReplySender
  = tokio::sync::mpsc::UnboundedSender<CompletionReply>;

// ===== UserMessage =====

pub type RelayReply = Result<String, crate::error::Error>;
pub type RelayReplySender
  = tokio::sync::mpsc::UnboundedSender<RelayReply>;

pub struct UserMessageArgs
{   pub user_id: i64
  , pub text: String
  , pub reply: RelayReplySender
}

// ===== NewChat =====

pub struct NewChatArgs
{   pub user_id: i64
  , pub reply: RelayReplySender
}

// ===== KillProcess =====

pub type KillReply = Result<(), crate::error::Error>;
pub type KillReplySender
  = tokio::sync::mpsc::UnboundedSender<KillReply>;

pub struct KillArgs
{   pub reply: KillReplySender
}

// ===== RelayHand (sender side) =====

pub struct RelayHand
{   pub user_message_tx
      : tokio::sync::mpsc::UnboundedSender<UserMessageArgs>
  , pub new_chat_tx
      : tokio::sync::mpsc::UnboundedSender<NewChatArgs>
  , pub kill_tx
      : tokio::sync::mpsc::UnboundedSender<KillArgs>
}

// ===== RelayFoot (receiver side) =====

pub struct RelayFoot
{   pub user_message_rx
      : tokio::sync::mpsc::UnboundedReceiver<UserMessageArgs>
  , pub new_chat_rx
      : tokio::sync::mpsc::UnboundedReceiver<NewChatArgs>
  , pub kill_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillArgs>
}

pub use config::ClovaConfig;
pub use error::Error;
pub use store::{ConversationStore, MemoryStore, Message, Role};
