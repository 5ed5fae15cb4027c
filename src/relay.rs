use tokio::sync::mpsc;
use log::{debug, error, info};

use crate::config::ClovaConfig;
use crate::providers::clova::{ClovaClient, CompletionParams};
use crate::store::{self, ConversationStore, Message};
use crate::RelayFoot;

/// Reply text substituted when a completion fails.
/// Errors are user-visible; a failed call never aborts the loop.
const APOLOGY_PREFIX: &str = "Sorry, there is an error. ";

/// Confirmation for a history reset
const NEW_CHAT_REPLY: &str = "Let's do New Chat!";

/// Backend state for the message relay
pub struct RelayBackendState<S: ConversationStore>
{   pub config: ClovaConfig
  , pub store: S
  , pub clova_client: ClovaClient
}

impl<S: ConversationStore> RelayBackendState<S>
{   /// Create a new backend state around a history store
    pub fn new(config: ClovaConfig, store: S) -> Self
    {   debug!("Initializing RelayBackendState");
        let clova_client = ClovaClient::new(config.clone());
        RelayBackendState
        {   config
          , store
          , clova_client
        }
    }

    /// Handle one inbound user message end to end:
    /// history read, window, completion, append-back.
    async fn handle_user_message(
      &mut self
    , user_id: i64
    , text: String
    ) -> String
    {   let new_message = Message::user(text);
        let mut messages = self.store.get_messages(user_id);
        messages.push(new_message.clone());
        let messages
          = store::window(messages, self.config.history_window);

        let response
          = self.complete_windowed(messages).await;

        match response
        {   Ok(answer) => {
              let response_text = answer.content.clone();
              self.store.put_message_list(
                user_id,
                vec![new_message, answer]
              );
              response_text
            }
          , Err(e) => {
              let response_text
                = format!("{}{}", APOLOGY_PREFIX, e);
              error!("{}", response_text);
              response_text
            }
        }
    }

    /// One completion round-trip through the Clova client
    async fn complete_windowed(
      &self
    , messages: Vec<Message>
    ) -> Result<Message, crate::error::Error>
    {   let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        self.clova_client
          .complete(
            messages,
            CompletionParams::default(),
            reply_tx
          )
          .await?;

        reply_rx.recv().await.unwrap_or_else(|| {
          error!("Clova client dropped reply channel");
          Err(crate::error::Error::Other(
            "Completion client disconnected".to_string()
          ))
        })
    }
}

/// Public API for the relay backend - owns the task
pub struct RelayBackend
{   hand: crate::RelayHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl RelayBackend
{   /// Create and spawn a relay over an in-memory store
    /// Returns immediately - spawns background task
    pub fn new(config: ClovaConfig) -> Self
    {   RelayBackend::with_store(
          config,
          crate::store::MemoryStore::new()
        )
    }

    /// Create and spawn a relay over a caller-supplied store
    pub fn with_store<S>(config: ClovaConfig, store: S) -> Self
      where S: ConversationStore + Send + Sync + 'static
    {   debug!("Creating RelayBackend with task ownership");

        let (user_message_tx, user_message_rx)
          = mpsc::unbounded_channel();
        let (new_chat_tx, new_chat_rx)
          = mpsc::unbounded_channel();
        let (kill_tx, kill_rx)
          = mpsc::unbounded_channel();

        let hand = crate::RelayHand
        {   user_message_tx: user_message_tx.clone()
          , new_chat_tx: new_chat_tx.clone()
          , kill_tx: kill_tx.clone()
        };

        let foot = crate::RelayFoot
        {   user_message_rx
          , new_chat_rx
          , kill_rx
        };

        let _task_handle = tokio::spawn(async move {
          run_relay_loop(foot, config, store).await
        });

        RelayBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue an inbound user message - returns almost immediately
    pub async fn user_message(
      &self
    , user_id: i64
    , text: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::RelayReply>,
        crate::error::Error
      >
    {   debug!("user_message queuing for user: {}", user_id);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::UserMessageArgs
        {   user_id
          , text
          , reply: reply_tx
        };

        self.hand.user_message_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::Other(
              "Backend disconnected".to_string()
            )
          })?;

        Ok(reply_rx)
    }

    /// Queue a history reset - returns almost immediately
    pub async fn new_chat(
      &self
    , user_id: i64
    ) -> Result<
        mpsc::UnboundedReceiver<crate::RelayReply>,
        crate::error::Error
      >
    {   debug!("new_chat queuing for user: {}", user_id);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::NewChatArgs
        {   user_id
          , reply: reply_tx
        };

        self.hand.new_chat_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::Other(
              "Backend disconnected".to_string()
            )
          })?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down RelayBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillArgs
        {   reply: reply_tx
        };

        self.hand.kill_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend shutdown timeout");
            Err(crate::error::Error::Timeout)
        }
    }
}

/// Main relay event loop
///
/// One inbound message triggers exactly one outbound completion call,
/// awaited in place. The store is read-then-append per user with no
/// cross-request locking.
async fn run_relay_loop<S>(
  foot: RelayFoot
, config: ClovaConfig
, store: S
) where S: ConversationStore + Send + Sync + 'static
{   debug!("Starting RelayBackend event loop");
    let mut state = RelayBackendState::new(config, store);
    let RelayFoot
    {   mut user_message_rx
      , mut new_chat_rx
      , mut kill_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = user_message_rx.recv() => {
          debug!(
            "Received UserMessage from user: {}",
            cmd.user_id
          );
          let response_text = state
            .handle_user_message(cmd.user_id, cmd.text)
            .await;
          let _ = cmd.reply.send(Ok(response_text));
        }
      , Some(cmd) = new_chat_rx.recv() => {
          info!("New chat for user {}", cmd.user_id);
          state.store.clear_messages(cmd.user_id);
          let _ = cmd.reply.send(
            Ok(NEW_CHAT_REPLY.to_string())
          );
        }
      , Some(cmd) = kill_rx.recv() => {
          debug!("Received KillProcess");
          let _ = state.clova_client.shutdown().await;
          let _ = cmd.reply.send(Ok(()));
          info!("RelayBackend shutting down");
          break;
        }
      }
    }
}
