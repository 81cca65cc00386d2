//! Transcript and generation types exchanged with the pipeline

use serde::{Deserialize, Serialize};

/// Speaker of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
}

/// One role-tagged turn of a chat transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: Role
  , pub content: String
}

impl ChatMessage
{   pub fn system(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::Assistant, content: content.into() }
    }
}

/// Knobs for a single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams
{   /// Token budget for the new turn
    pub max_new_tokens: usize
  , /// Token ids that end generation early
    pub eos_token_id: Vec<u32>
  , /// Sampling temperature
    pub temperature: f32
}

/// One result record; `generated_text` is the input transcript
/// followed by the generated turn(s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput
{   pub generated_text: Vec<ChatMessage>
}
