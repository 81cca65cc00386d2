use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use log::{debug, trace, error, info};
use crate::request::{ChatMessage, GenerationOutput};

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse
{   pub choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: ChatMessage
  , pub finish_reason: Option<String>
}

// ===== Hugging Face Client Actor =====

pub type GenerateReply
  = Result<Vec<GenerationOutput>, crate::error::Error>;
pub type TokenizerReply
  = Result<String, crate::error::Error>;

/// Commands for HuggingFaceClient actor
pub enum HuggingFaceCommand
{   Generate
    {   request: ChatCompletionRequest
      , reply: mpsc::UnboundedSender<GenerateReply>
    }
  , LoadTokenizerConfig
    {   model: String
      , reply: mpsc::UnboundedSender<TokenizerReply>
    }
  , Shutdown
}

/// Endpoints and credential the actor talks to
#[derive(Clone)]
pub struct Endpoints
{   pub inference_url: String
  , pub hub_url: String
  , pub api_key: String
  , pub timeout: Option<Duration>
}

struct HuggingFaceClientState
{   endpoints: Endpoints
  , http_client: reqwest::Client
}

/// Map a non-success status onto the error taxonomy
fn status_error(
  status: reqwest::StatusCode
, body: String
, resource: &str
) -> crate::error::Error
{   match status.as_u16()
    {   401 | 403 => crate::error::Error::Unauthorized(
          format!("{} ({}): {}", resource, status, body)
        )
      , 404 => crate::error::Error::ModelNotFound(resource.to_string())
      , _ => crate::error::Error::ApiError(
          format!("{} ({}): {}", resource, status, body)
        )
    }
}

impl HuggingFaceClientState
{   fn new(endpoints: Endpoints)
      -> Result<Self, crate::error::Error>
    {   debug!("Creating HuggingFaceClientState");
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = endpoints.timeout
        {   builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          crate::error::Error::HttpError(e.to_string())
        })?;
        Ok(HuggingFaceClientState { endpoints, http_client })
    }

    async fn handle_load_tokenizer_config(
      &self
    , model: String
    ) -> Result<String, crate::error::Error>
    {   debug!("Handling load_tokenizer_config for: {}", model);

        let url = format!(
          "{}/{}/resolve/main/tokenizer_config.json",
          self.endpoints.hub_url, model
        );

        let response = self.http_client
          .get(&url)
          .bearer_auth(&self.endpoints.api_key)
          .send()
          .await
          .map_err(|e| {
            error!("Failed to fetch tokenizer config: {}", e);
            crate::error::error_from_reqwest(e)
          })?;

        let status = response.status();
        trace!("Tokenizer config response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Hub rejected tokenizer request: {}", error_text);
            return Err(status_error(status, error_text, &model));
        }

        response.text().await.map_err(|e| {
          error!("Failed to read tokenizer config: {}", e);
          crate::error::error_from_reqwest(e)
        })
    }

    async fn handle_generate(
      &self
    , request: ChatCompletionRequest
    ) -> GenerateReply
    {   debug!("Handling generate for: {}", request.model);
        trace!("Chat completion request: {:?}", request);

        let response = self.http_client
          .post(format!("{}/chat/completions", self.endpoints.inference_url))
          .bearer_auth(&self.endpoints.api_key)
          .header("Content-Type", "application/json")
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            crate::error::error_from_reqwest(e)
          })?;

        let status = response.status();
        trace!("Chat completion response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Inference API error: {}", error_text);
            return Err(status_error(status, error_text, &request.model));
        }

        let chat_response: ChatCompletionResponse
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            crate::error::Error::ParseError(e.to_string())
          })?;

        let choice = chat_response.choices.into_iter().next()
          .ok_or_else(|| {
            error!("No choices in response");
            crate::error::Error::NoGeneratedText
          })?;
        debug!("Generation finished: {:?}", choice.finish_reason);

        let mut generated_text = request.messages;
        generated_text.push(choice.message);
        Ok(vec![GenerationOutput { generated_text }])
    }
}

/// Public Hugging Face client interface
pub struct HuggingFaceClient
{   tx: mpsc::UnboundedSender<HuggingFaceCommand>
  , _task: tokio::task::JoinHandle<()>
}

impl HuggingFaceClient
{   /// Create and spawn a new Hugging Face client
    pub fn new(endpoints: Endpoints)
      -> Result<Self, crate::error::Error>
    {   debug!("Creating HuggingFaceClient");
        let state = HuggingFaceClientState::new(endpoints)?;
        let (cmd_tx, cmd_rx)
          = mpsc::unbounded_channel();

        let _task = tokio::spawn(async move {
          run_huggingface_loop(cmd_rx, state).await;
        });

        Ok(HuggingFaceClient
        {   tx: cmd_tx
          , _task
        })
    }

    fn queue(&self, cmd: HuggingFaceCommand)
      -> Result<(), crate::error::Error>
    {   self.tx.send(cmd).map_err(|_| {
          error!("Hugging Face client disconnected");
          crate::error::Error::Other(
            "Hugging Face client disconnected".to_string()
          )
        })
    }

    /// Queue a generation request - returns immediately
    pub fn generate(
      &self
    , request: ChatCompletionRequest
    , reply: mpsc::UnboundedSender<GenerateReply>
    ) -> Result<(), crate::error::Error>
    {   debug!("generate queued for model: {}", request.model);
        self.queue(HuggingFaceCommand::Generate { request, reply })
    }

    /// Queue a tokenizer config download - returns immediately
    pub fn load_tokenizer_config(
      &self
    , model: String
    , reply: mpsc::UnboundedSender<TokenizerReply>
    ) -> Result<(), crate::error::Error>
    {   debug!("load_tokenizer_config queued for model: {}", model);
        self.queue(HuggingFaceCommand::LoadTokenizerConfig { model, reply })
    }

    /// Shutdown the client
    pub fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down HuggingFaceClient");
        self.tx.send(HuggingFaceCommand::Shutdown)
          .map_err(|_| {
            crate::error::Error::Other(
              "Client already shutdown".to_string()
            )
          })
    }
}

/// Main hugging face event loop
async fn run_huggingface_loop(
  mut cmd_rx: mpsc::UnboundedReceiver<HuggingFaceCommand>
, state: HuggingFaceClientState
)
{   debug!("Starting Hugging Face client loop");

    loop
    { match cmd_rx.recv().await
      {   Some(HuggingFaceCommand::Generate { request, reply }) => {
            debug!("Processing Generate");
            let result = state.handle_generate(request).await;
            let _ = reply.send(result);
          }
        , Some(HuggingFaceCommand::LoadTokenizerConfig {
            model, reply
          }) => {
            debug!("Processing LoadTokenizerConfig");
            let result = state
              .handle_load_tokenizer_config(model)
              .await;
            let _ = reply.send(result);
          }
        , Some(HuggingFaceCommand::Shutdown) => {
            info!("Hugging Face client shutting down");
            break;
          }
        , None => {
            debug!("Command channel closed");
            break;
          }
      }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn request_omits_unset_fields()
    {   let request = ChatCompletionRequest
        {   model: "m".to_string()
          , messages: vec![ChatMessage::user("hi")]
          , max_tokens: Some(100)
          , temperature: None
          , stop: None
          , stream: Some(false)
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("stop").is_none());
        assert_eq!(value["max_tokens"], 100);
    }

    #[test]
    fn auth_statuses_map_to_unauthorized()
    {   let e = status_error(
          reqwest::StatusCode::FORBIDDEN,
          "gated".to_string(),
          "meta-llama/Meta-Llama-3-8B-Instruct"
        );
        assert!(matches!(e, crate::error::Error::Unauthorized(_)));

        let e = status_error(
          reqwest::StatusCode::NOT_FOUND,
          String::new(),
          "nobody/nothing"
        );
        assert_eq!(
          e,
          crate::error::Error::ModelNotFound("nobody/nothing".to_string())
        );
    }
}
