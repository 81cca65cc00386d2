//! Special-token table loaded from a Hub `tokenizer_config.json`

use std::collections::HashMap;
use log::{debug, error};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenizerConfigFile
{   #[serde(default)]
    added_tokens_decoder: HashMap<String, AddedToken>
  , eos_token: Option<TokenField>
}

#[derive(Debug, Deserialize)]
struct AddedToken
{   content: String
}

/// `eos_token` is either a bare string or a serialized AddedToken
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenField
{   Plain(String)
  , Added(AddedToken)
}

impl TokenField
{   fn into_content(self) -> String
    {   match self
        {   TokenField::Plain(s) => s
          , TokenField::Added(t) => t.content
        }
    }
}

/// Tokenizer metadata needed to express stop conditions
#[derive(Debug, Clone, PartialEq)]
pub struct Tokenizer
{   eos_token_id: u32
  , token_to_id: HashMap<String, u32>
  , id_to_token: HashMap<u32, String>
}

impl Tokenizer
{   /// Parse the contents of a `tokenizer_config.json`
    pub fn from_config_json(raw: &str)
      -> Result<Self, crate::error::Error>
    {   let file: TokenizerConfigFile = serde_json::from_str(raw)
          .map_err(|e| {
            error!("Bad tokenizer config: {}", e);
            crate::error::Error::ParseError(e.to_string())
          })?;

        let mut token_to_id = HashMap::new();
        let mut id_to_token = HashMap::new();
        for (id, token) in file.added_tokens_decoder
        {   let id: u32 = id.parse().map_err(|_| {
              crate::error::Error::ParseError(
                format!("non-numeric token id: {}", id)
              )
            })?;
            token_to_id.insert(token.content.clone(), id);
            id_to_token.insert(id, token.content);
        }

        let eos_token = file.eos_token
          .map(TokenField::into_content)
          .ok_or_else(|| {
            crate::error::Error::ParseError(
              "tokenizer config has no eos_token".to_string()
            )
          })?;
        let eos_token_id = *token_to_id.get(&eos_token)
          .ok_or_else(|| {
            error!("eos_token {} missing from vocabulary", eos_token);
            crate::error::Error::UnknownToken(eos_token.clone())
          })?;

        debug!(
          "Tokenizer loaded: {} special tokens, eos {}={}",
          token_to_id.len(), eos_token, eos_token_id
        );
        Ok(Tokenizer { eos_token_id, token_to_id, id_to_token })
    }

    pub fn eos_token_id(&self) -> u32
    {   self.eos_token_id
    }

    pub fn convert_tokens_to_ids(&self, token: &str)
      -> Result<u32, crate::error::Error>
    {   self.token_to_id.get(token)
          .copied()
          .ok_or_else(|| {
            crate::error::Error::UnknownToken(token.to_string())
          })
    }

    pub fn convert_ids_to_tokens(&self, id: u32)
      -> Result<&str, crate::error::Error>
    {   self.id_to_token.get(&id)
          .map(String::as_str)
          .ok_or_else(|| {
            crate::error::Error::UnknownToken(id.to_string())
          })
    }
}
