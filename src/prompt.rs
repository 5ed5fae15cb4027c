//! Prompt flattening and answer extraction
//!
//! The LK-D2 completion endpoint is plain-text: conversation turns are
//! delimited by two fixed Korean markers, "질문:" for the user and
//! "답변:" for the assistant. The model continues the pattern past the
//! first turn, so the first answer segment has to be cut back out of
//! the raw completion.

use crate::store::{Message, Role};

/// Instructional preamble prepended to every flattened prompt
pub const MAIN_PROMPT: &str
  = "당신은 친절하고 유능한 AI 어시스턴트입니다. \
     사용자의 질문에 정확하고 간결하게 답변하세요.\n";

/// Turn delimiters understood by the completion model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker
{   Question
  , Answer
}

impl Marker
{   /// Bare marker literal, as it appears mid-text
    pub fn as_str(&self) -> &'static str
    {   match self
        {   Marker::Question => "질문:"
          , Marker::Answer => "답변:"
        }
    }

    /// Marker plus the separating space used when emitting a turn
    pub fn prefix(&self) -> &'static str
    {   match self
        {   Marker::Question => "질문: "
          , Marker::Answer => "답변: "
        }
    }

    /// Byte offset of the first occurrence in `text`
    pub fn find_in(&self, text: &str) -> Option<usize>
    {   text.find(self.as_str())
    }
}

/// Serialize ordered turns into one text blob.
///
/// User turns become "질문: {content}\n", assistant turns
/// "답변: {content}\n", in original order. System messages are not
/// emitted - the caller represents them through the preamble.
/// Marker-like substrings inside content are not escaped, so such
/// content can mis-split downstream.
pub fn flatten_messages(messages: &[Message]) -> String
{   let mut text = String::new();
    for message in messages
    {   match message.role
        {   Role::User => {
              text.push_str(Marker::Question.prefix());
              text.push_str(&message.content);
              text.push('\n');
            }
          , Role::Assistant => {
              text.push_str(Marker::Answer.prefix());
              text.push_str(&message.content);
              text.push('\n');
            }
          , Role::System => {}
        }
    }
    text
}

/// Preamble plus flattened turns - the full request text
pub fn build_prompt(messages: &[Message]) -> String
{   format!("{}{}", MAIN_PROMPT, flatten_messages(messages))
}

/// Drop an echoed prompt prefix from the raw completion.
/// The API is known to echo the request text back; when the output
/// does not start with the prompt this is a no-op.
pub fn strip_prompt_echo<'a>(
  output: &'a str
, prompt: &str
) -> &'a str
{   output.strip_prefix(prompt).unwrap_or(output)
}

/// Drop a single leading "답변: " if present
pub fn strip_answer_marker(text: &str) -> &str
{   text.strip_prefix(Marker::Answer.prefix())
      .unwrap_or(text)
}

/// Isolate the first answer segment from post-stripped model output.
///
/// Split after the first answer marker (the whole text when absent),
/// then truncate before the first question marker in the remainder.
/// The second step fires even when the first did not: the model's
/// first line may already be the answer without repeating the marker.
pub fn extract_first_answer(s: &str)
  -> Result<String, crate::error::Error>
{   if s.is_empty()
    {   return Err(crate::error::Error::InvalidInput(
          "completion text is empty".to_string()
        ));
    }

    let answer_part = match Marker::Answer.find_in(s)
    {   Some(idx) => {
          s[idx + Marker::Answer.as_str().len()..].trim()
        }
      , None => s
    };

    let first_answer = match Marker::Question.find_in(answer_part)
    {   Some(idx) => answer_part[..idx].trim()
      , None => answer_part
    };

    Ok(first_answer.trim().to_string())
}
