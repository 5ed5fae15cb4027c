use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use log::{debug, trace, error, info};

use crate::config::ClovaConfig;
use crate::prompt;
use crate::store::Message;

/// Remote status code for a successful completion
const STATUS_SUCCESS: &str = "20000";

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize)]
pub struct ClovaCompletionRequest
{   pub text: String
  , #[serde(rename = "maxTokens")]
    pub max_tokens: usize
  , pub temperature: f32
  , #[serde(rename = "topK")]
    pub top_k: usize
  , #[serde(rename = "topP")]
    pub top_p: f32
  , #[serde(rename = "repeatPenalty")]
    pub repeat_penalty: f32
  , pub start: String
  , pub restart: String
  , #[serde(rename = "stopBefore")]
    pub stop_before: Vec<String>
  , #[serde(rename = "includeTokens")]
    pub include_tokens: bool
  , #[serde(rename = "includeAiFilters")]
    pub include_ai_filters: bool
  , #[serde(rename = "includeProbs")]
    pub include_probs: bool
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClovaCompletionResponse
{   pub status: ClovaStatus
  , #[serde(default)]
    pub result: Option<ClovaResult>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClovaStatus
{   pub code: String
  , pub message: String
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClovaResult
{   pub text: String
}

// ===== Generation Parameters =====

/// Generation parameters passed through to the API unmodified
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams
{   pub max_tokens: usize
  , pub temperature: f32
  , pub top_k: usize
  , pub top_p: f32
  , pub repeat_penalty: f32
  , pub start: String
  , pub restart: String
  , pub stop_before: Vec<String>
  , pub include_tokens: bool
  , pub include_ai_filters: bool
  , pub include_probs: bool
}

impl Default for CompletionParams
{   fn default() -> Self
    {   CompletionParams
        {   max_tokens: 512
          , temperature: 0.5
          , top_k: 0
          , top_p: 0.8
          , repeat_penalty: 5.0
          , start: String::new()
          , restart: String::new()
          , stop_before: vec![]
          , include_tokens: true
          , include_ai_filters: true
          , include_probs: false
        }
    }
}

impl CompletionParams
{   fn into_request(self, text: String)
      -> ClovaCompletionRequest
    {   ClovaCompletionRequest
        {   text
          , max_tokens: self.max_tokens
          , temperature: self.temperature
          , top_k: self.top_k
          , top_p: self.top_p
          , repeat_penalty: self.repeat_penalty
          , start: self.start
          , restart: self.restart
          , stop_before: self.stop_before
          , include_tokens: self.include_tokens
          , include_ai_filters: self.include_ai_filters
          , include_probs: self.include_probs
        }
    }
}

// ===== Clova Client Actor =====

/// Commands for ClovaClient actor
pub enum ClovaCommand
{   Complete
    {   messages: Vec<Message>
      , params: CompletionParams
      , reply: mpsc::UnboundedSender<crate::CompletionReply>
    }
  , Shutdown
}

/// Clova client state
pub struct ClovaClientState
{   config: ClovaConfig
  , http_client: reqwest::Client
}

impl ClovaClientState
{   pub fn new(config: ClovaConfig) -> Self
    {   debug!("Creating ClovaClientState");
        ClovaClientState
        {   config
          , http_client: reqwest::Client::new()
        }
    }

    /// One flattened prompt, one POST, one extracted answer.
    /// Failures come back as error results; nothing is retried.
    pub async fn handle_complete(
      &self
    , messages: Vec<Message>
    , params: CompletionParams
    ) -> Result<Message, crate::error::Error>
    {   debug!(
          "Handling complete for {} messages",
          messages.len()
        );

        let prompt_text = prompt::build_prompt(&messages);
        trace!("Prompt text: {}", prompt_text);

        // Fresh correlation id per call
        let request_id = uuid::Uuid::new_v4().to_string();

        let request
          = params.into_request(prompt_text.clone());

        let response = self.http_client
          .post(self.config.completions_url())
          .header(
            "Content-Type",
            "application/json; charset=utf-8"
          )
          .header(
            "X-NCP-CLOVASTUDIO-API-KEY",
            self.config.api_key.as_str()
          )
          .header(
            "X-NCP-APIGW-API-KEY",
            self.config.api_key_primary_val.as_str()
          )
          .header(
            "X-NCP-CLOVASTUDIO-REQUEST-ID",
            request_id.as_str()
          )
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            crate::error::Error::HttpError(e.to_string())
          })?;

        let status = response.status();
        trace!("Clova response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Clova API error: {}", error_text);
            return Err(crate::error::Error::HttpError(
              format!("{}: {}", status, error_text)
            ));
        }

        let body = response.text().await.map_err(|e| {
          error!("Body read error: {}", e);
          crate::error::Error::HttpError(e.to_string())
        })?;

        process_response_body(&body, &prompt_text)
    }
}

/// Map a raw response body to an assistant message.
///
/// Checks the embedded status code, then strips the echoed prompt,
/// strips a leading answer marker and isolates the first answer
/// segment. Pure so the rejection and success paths test without a
/// live endpoint.
pub fn process_response_body(
  body: &str
, prompt_text: &str
) -> Result<Message, crate::error::Error>
{   let parsed: ClovaCompletionResponse
      = serde_json::from_str(body).map_err(|e| {
        error!("Parse error: {}", e);
        crate::error::Error::ParseError(e.to_string())
      })?;

    if parsed.status.code != STATUS_SUCCESS
    {   error!(
          "Clova rejected request: {} ({})",
          parsed.status.message,
          parsed.status.code
        );
        return Err(crate::error::Error::ApiError(
          parsed.status.message
        ));
    }

    let result = parsed.result.ok_or_else(|| {
      error!("Success status but no result field");
      crate::error::Error::ParseError(
        "response missing result.text".to_string()
      )
    })?;

    let output
      = prompt::strip_prompt_echo(&result.text, prompt_text)
        .trim();
    let output = prompt::strip_answer_marker(output);
    let content = prompt::extract_first_answer(output)?;

    Ok(Message::assistant(content))
}

/// Public Clova client interface
pub struct ClovaClient
{   tx: mpsc::UnboundedSender<ClovaCommand>
  , _task: tokio::task::JoinHandle<()>
}

impl ClovaClient
{   /// Create and spawn a new Clova client
    pub fn new(config: ClovaConfig) -> Self
    {   debug!("Creating ClovaClient");
        let (cmd_tx, cmd_rx)
          = mpsc::unbounded_channel();

        let _task = tokio::spawn(async move {
          run_clova_loop(cmd_rx, config).await;
        });

        ClovaClient
        {   tx: cmd_tx
          , _task
        }
    }

    /// Queue a completion - returns immediately
    pub async fn complete(
      &self
    , messages: Vec<Message>
    , params: CompletionParams
    , reply: mpsc::UnboundedSender<crate::CompletionReply>
    ) -> Result<(), crate::error::Error>
    {   debug!("complete queued");

        self.tx.send(ClovaCommand::Complete {
          messages,
          params,
          reply,
        }).map_err(|_| {
          error!("Clova client disconnected");
          crate::error::Error::Other(
            "Clova client disconnected".to_string()
          )
        })
    }

    /// Shutdown the client
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down ClovaClient");
        self.tx.send(ClovaCommand::Shutdown)
          .map_err(|_| {
            crate::error::Error::Other(
              "Client already shutdown".to_string()
            )
          })
    }
}

/// Main clova event loop
///
/// One command at a time: a single inbound message maps to a single
/// outbound HTTP call with no internal parallelism.
async fn run_clova_loop(
  mut cmd_rx: mpsc::UnboundedReceiver<ClovaCommand>
, config: ClovaConfig
)
{   debug!("Starting Clova client loop");
    let state = ClovaClientState::new(config);

    loop
    { match cmd_rx.recv().await
      {   Some(ClovaCommand::Complete {
            messages, params, reply
          }) => {
            debug!("Processing Complete");
            let result = state
              .handle_complete(messages, params)
              .await;
            let _ = reply.send(result);
          }
        , Some(ClovaCommand::Shutdown) => {
            info!("Clova client shutting down");
            break;
          }
        , None => {
            debug!("Command channel closed");
            break;
          }
      }
    }
}
