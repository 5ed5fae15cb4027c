//! Configuration for the CLOVA Studio endpoint and the relay

use serde::{Deserialize, Serialize};
use log::debug;

const DEFAULT_API_HOST: &str
  = "clovastudio.apigw.ntruss.com";

/// Messages kept when assembling a prompt from stored history.
/// The store itself is unbounded; only the prompt window is capped.
const DEFAULT_HISTORY_WINDOW: usize = 40;

/// Process-wide configuration, read once at startup.
/// Credentials are required up front - there are no placeholder
/// fallbacks, a missing variable fails construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClovaConfig
{   /// Completion service host
    pub api_host: String
  , /// CLOVA Studio API key
    pub api_key: String
  , /// API gateway primary-value credential
    pub api_key_primary_val: String
  , /// Chat platform bot token
    pub bot_token: String
  , /// Max history messages flattened into one prompt
    pub history_window: usize
}

impl ClovaConfig
{   /// Read configuration from the environment
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   debug!("Reading ClovaConfig from environment");
        let api_host = std::env::var("CLOVA_API_HOST")
          .unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
        let api_key = require_var("CLOVA_API_KEY")?;
        let api_key_primary_val
          = require_var("CLOVA_API_KEY_PRIMARY_VAL")?;
        let bot_token = require_var("BOT_TOKEN")?;

        Ok(ClovaConfig
        {   api_host
          , api_key
          , api_key_primary_val
          , bot_token
          , history_window: DEFAULT_HISTORY_WINDOW
        })
    }

    /// Build a config directly, for embedding and tests
    pub fn new(
      api_key: String
    , api_key_primary_val: String
    , bot_token: String
    ) -> Self
    {   ClovaConfig
        {   api_host: DEFAULT_API_HOST.to_string()
          , api_key
          , api_key_primary_val
          , bot_token
          , history_window: DEFAULT_HISTORY_WINDOW
        }
    }

    /// Completion endpoint URL for this config
    pub fn completions_url(&self) -> String
    {   format!(
          "https://{}/testapp/v1/completions/LK-D2",
          self.api_host
        )
    }
}

fn require_var(name: &str)
  -> Result<String, crate::error::Error>
{   std::env::var(name)
      .map_err(|_| {
        crate::error::Error::MissingCredential(
          name.to_string()
        )
      })
}
